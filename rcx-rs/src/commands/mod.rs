//! Command implementations

pub mod info;
pub mod observer;

use aom_rcx::{EngineVariant, ParseOptions};

/// Decoder options for the `--legacy` switch
pub fn parse_options(legacy: bool) -> ParseOptions {
    ParseOptions::for_variant(if legacy {
        EngineVariant::Legacy
    } else {
        EngineVariant::Extended
    })
}
