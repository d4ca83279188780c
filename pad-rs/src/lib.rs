//! Pad: a template-embedded scripting language.
//!
//! Literal text passes through to the output; `{@ ... @}` blocks hold code
//! and `{: ... :}` blocks interpolate the value of a formula.  See
//! [`kit::Kit`] for the simplest entry point and [`lang`] for the pieces.

pub mod cli;
pub mod config;
pub mod kit;
pub mod lang;
