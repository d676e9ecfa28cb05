use bitflags::bitflags;

bitflags! {
    /// Caller-supplied decode options. See `spec.md` §6.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// Read the structural skeleton of class/instance/array dumps but
        /// discard raw field payloads (still accounting for their byte
        /// length). Visitors still receive id/type metadata.
        const SKIP_VALUES = 1 << 0;
    }
}
