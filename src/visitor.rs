//! The pluggable callback surface decoded events are delivered to
//! (`spec.md` §9's "capability/trait object with default-`None` methods").
//!
//! Every method has a no-op default, so a visitor only overrides the
//! handful of record kinds it cares about. The `interested_in*` gates
//! default to `true`, which is also correct by default — `spec.md` §8
//! requires that a visitor registering no callbacks produce the same
//! cursor trajectory as one that registers every callback and ignores the
//! result. Overriding a gate to `false` only changes performance, not
//! observable behavior of the *decoder*; it does change what that visitor
//! itself is told, naturally, since it asked not to be told.

use crate::gc_record::{ClassDump, PrimArrayElements};
use crate::header::Header;

/// One `ALLOC_SITES` entry (`spec.md` §4.3).
#[derive(Debug, Clone, Copy)]
pub struct AllocSite {
    pub is_array: u8,
    pub class_serial: u32,
    pub stack_trace_serial: u32,
    pub live_bytes: u32,
    pub live_instances: u32,
    pub alloc_bytes: u32,
    pub alloc_instances: u32,
}

pub trait Visitor {
    /// Whether the decoder should parse this top-level record tag at all.
    /// Returning `false` skips the body with a single `skip(length)`.
    /// Computed once per record by the driver.
    fn interested_in_record(&self, _tag: u8) -> bool {
        true
    }

    /// Whether the decoder should read full payload for this heap
    /// sub-record tag (constant-width GC roots get a single-skip fast
    /// path when `false`; class/instance/array dumps still read their
    /// skeleton but skip bulk payload bytes).
    fn interested_in_sub_record(&self, _tag: u8) -> bool {
        true
    }

    fn header(&mut self, _header: &Header) {}

    fn utf8(&mut self, _id: u64, _value: &str) {}

    fn load_class(
        &mut self,
        _class_serial: u32,
        _class_object_id: u64,
        _stack_trace_serial: u32,
        _class_name_id: u64,
    ) {
    }

    fn unload_class(&mut self, _class_serial: u32) {}

    fn frame(
        &mut self,
        _stack_frame_id: u64,
        _method_name_id: u64,
        _method_signature_id: u64,
        _source_file_name_id: u64,
        _class_serial: u32,
        _line_number: i32,
    ) {
    }

    fn trace(&mut self, _stack_trace_serial: u32, _thread_serial: u32, _frame_ids: &[u64]) {}

    fn alloc_sites(
        &mut self,
        _flags: u16,
        _cutoff_ratio: u32,
        _live_bytes: u32,
        _live_instances: u32,
        _alloc_bytes: u64,
        _alloc_instances: u64,
        _sites: &[AllocSite],
    ) {
    }

    fn start_thread(
        &mut self,
        _thread_serial: u32,
        _thread_object_id: u64,
        _stack_trace_serial: u32,
        _thread_name_id: u64,
        _thread_group_name_id: u64,
        _thread_group_parent_name_id: u64,
    ) {
    }

    fn end_thread(&mut self, _thread_serial: u32) {}

    fn heap_summary(
        &mut self,
        _live_bytes: u32,
        _live_instances: u32,
        _alloc_bytes: u64,
        _alloc_instances: u64,
    ) {
    }

    /// Fired exactly once, the first time a `HEAP_DUMP` or
    /// `HEAP_DUMP_SEGMENT` record is entered.
    fn heap_dump_start(&mut self) {}

    fn cpu_samples(&mut self, _total_samples: u32, _traces: &[(u32, u32)]) {}

    fn control_settings(&mut self, _flags: u32, _stack_trace_depth: u16) {}

    fn heap_dump_end(&mut self) {}

    fn gc_root_unknown(&mut self, _object_id: u64) {}
    fn gc_root_jni_global(&mut self, _object_id: u64, _jni_global_ref_id: u64) {}
    fn gc_root_jni_local(&mut self, _object_id: u64, _thread_serial: u32, _frame_number: u32) {}
    fn gc_root_java_frame(&mut self, _object_id: u64, _thread_serial: u32, _frame_number: u32) {}
    fn gc_root_native_stack(&mut self, _object_id: u64, _thread_serial: u32) {}
    fn gc_root_sticky_class(&mut self, _object_id: u64) {}
    fn gc_root_thread_block(&mut self, _object_id: u64, _thread_serial: u32) {}
    fn gc_root_monitor_used(&mut self, _object_id: u64) {}
    fn gc_root_thread_obj(&mut self, _object_id: u64, _thread_serial: u32, _stack_trace_serial: u32) {}

    fn gc_class_dump(&mut self, _class_dump: &ClassDump) {}

    fn gc_instance_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        _class_object_id: u64,
        _field_bytes: Option<&[u8]>,
    ) {
    }

    fn gc_obj_array_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        _array_class_id: u64,
        _elements: &[u64],
    ) {
    }

    fn gc_prim_array_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        _elements: &PrimArrayElements,
    ) {
    }

    /// Escape hatch for a top-level record tag outside the closed set this
    /// crate knows how to decode structurally (`spec.md` §4.3). Bodies are
    /// handed over verbatim; the decoder never errors on an unrecognized
    /// top-level tag, since frame length is always authoritative and the
    /// record can simply be forwarded or skipped.
    fn raw(&mut self, _tag: u8, _ts_delta: u32, _body: &[u8]) {}

    fn end(&mut self) {}
}

/// A visitor that registers no callbacks. Used by tests that only care
/// about cursor trajectory / byte accounting, per `spec.md` §8's
/// "registers no callbacks" invariant.
#[cfg(test)]
pub struct NoopVisitor;

#[cfg(test)]
impl Visitor for NoopVisitor {}
