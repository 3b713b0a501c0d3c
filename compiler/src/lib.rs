// shtfl — StableHLO to TFLite custom-op legalizer
//
// Library root. Front end (lexer, parser, resolve), IR, the legalize pass
// and its collaborators, and the pass pipeline.

pub mod ast;
pub mod attr;
pub mod diag;
pub mod encode;
pub mod error;
pub mod flexbuf;
pub mod id;
pub mod inspect;
pub mod ir;
pub mod legalize;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod printer;
pub mod registry;
pub mod resolve;
pub mod select;
pub mod types;

pub use error::{Error, Result};
pub use legalize::{legalize_module, LegalizeConfig, LegalizeResult, RewriteRecord};
pub use pipeline::legalize_source;
