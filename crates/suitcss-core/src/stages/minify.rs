/*
 * stages/minify.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Minification via grass.
 */

//! The `minify` stage: re-emits the stylesheet with grass's compressed
//! output style, parsing the input as plain CSS.

use async_trait::async_trait;
use grass::{InputSyntax, Options, OutputStyle};

use crate::config::stage_ids::MINIFY;
use crate::error::PipelineError;
use crate::stage::{Stage, StageContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyStage;

pub(crate) fn minify(css: &str) -> Result<String, PipelineError> {
    let options = Options::default()
        .style(OutputStyle::Compressed)
        .input_syntax(InputSyntax::Css)
        .quiet(true);
    grass::from_string(css.to_string(), &options)
        .map(|out| out.trim_end().to_string())
        .map_err(|e| PipelineError::stage_failure(MINIFY, e.to_string()))
}

#[async_trait]
impl Stage for MinifyStage {
    fn name(&self) -> &str {
        MINIFY
    }

    async fn run(&self, css: String, _ctx: &mut StageContext) -> Result<String, PipelineError> {
        minify(&css)
    }
}
