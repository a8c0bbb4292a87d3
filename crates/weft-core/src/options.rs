//! Reconstruction options.

/// Knobs recognized by the join engine and honored by the emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Diagnostic mode: force a span split whenever an incoming glyph's
    /// pre-transform y differs from the running offset. Stresses the
    /// downstream join logic, which must re-merge the pieces.
    pub autosplit: bool,

    /// Emitter hint: insert a synthetic empty paragraph between emitted
    /// paragraphs, and an extra one between paragraphs of differing ctm4.
    pub spacing: bool,

    /// Allow the table reconstructor to run. When false every page gets a
    /// single subpage and no tables.
    pub layout_analysis: bool,
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            autosplit: false,
            spacing: true,
            layout_analysis: true,
        }
    }
}
