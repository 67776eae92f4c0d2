//! Color-management capability interface.

use crate::context::Context;
use crate::error::ColorResult;
use crate::processor::Processor;
use std::fmt::Debug;
use std::sync::Arc;

/// A color-management engine the adapter delegates to.
///
/// Implementations must be safe to share between render threads.
pub trait ColorEngine: Send + Sync + Debug {
    /// Configuration name, for messages.
    fn name(&self) -> &str;

    /// Colorspace names in configuration order.
    fn colorspace_names(&self) -> Vec<String>;

    /// True when `name` resolves to a colorspace (by name, alias or role).
    fn has_colorspace(&self, name: &str) -> bool;

    /// Colorspace `name` resolves to after context substitution.
    fn canonical_name(&self, name: &str, context: &Context) -> Option<String>;

    /// Transform from `input` to `output`.
    ///
    /// Fails with [`ColorError::ColorSpaceNotFound`](crate::ColorError::ColorSpaceNotFound)
    /// if either space is unknown.
    fn processor(&self, input: &str, output: &str, context: &Context) -> ColorResult<Arc<Processor>>;

    /// Colorspace named inside free text such as a file name.
    fn colorspace_from_string(&self, _text: &str) -> Option<String> {
        None
    }

    /// Drops cached processors.
    fn purge_cache(&self) {}
}
