//! The built-in [`Visitor`] that turns a streamed decode into a per-class
//! instance histogram (`spec.md` §4.5), playing the role the teacher's
//! `ResultRecorder`/`RenderedResult` pair plays for `hprof-slurp`'s CLI
//! summary, but built on this crate's pluggable visitor instead of a
//! dedicated channel consumer.

use ahash::AHashMap;
use tracing::warn;

use crate::gc_record::{ClassDump, PrimArrayElements};
use crate::header::Header;
use crate::ids::{value_size, IdSize, ValueType};
use crate::visitor::Visitor;

/// `objectHeader = align(idSize + 4, idSize)`: mark word plus a (possibly
/// compressed) klass pointer, rounded up to the identifier width.
fn object_header(id_size: IdSize) -> u32 {
    align(id_size.bytes() + 4, id_size.bytes())
}

/// Array header adds the 4-byte length word on top of the object header,
/// again rounded to the identifier width.
fn array_header(id_size: IdSize) -> u32 {
    align(object_header(id_size) + 4, id_size.bytes())
}

fn align(n: u32, to: u32) -> u32 {
    if to == 0 {
        n
    } else {
        n.div_ceil(to) * to
    }
}

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClassTotals {
    pub instance_count: u64,
    pub shallow_bytes: u64,
}

#[derive(Debug, Clone, Default)]
struct ClassInfo {
    name_id: Option<u64>,
    /// Resolved eagerly from `name_id` at `heap_dump_start`, once the
    /// string table is about to be dropped.
    resolved_name: Option<String>,
    super_class_object_id: u64,
    instance_size: u32,
}

/// One row of the final histogram: a resolved label (a class name, or a
/// synthetic array name) with its accumulated instance count and estimated
/// shallow size in bytes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Entry {
    pub label: String,
    pub instance_count: u64,
    pub shallow_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Totals {
    pub string_count: u64,
    pub class_count: u64,
    pub instance_count: u64,
    pub object_array_count: u64,
    pub primitive_array_count: u64,
    pub shallow_bytes: u64,
}

/// Aggregates a streamed hprof decode into a per-class instance histogram
/// without retaining raw field payloads; a single pass over the stream is
/// enough since every size estimate only needs the class dumps seen so far
/// plus the string table.
pub struct Aggregator {
    id_size: IdSize,
    strings: AHashMap<u64, String>,
    classes: AHashMap<u64, ClassInfo>,
    histogram: AHashMap<String, ClassTotals>,
    totals: Totals,
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator {
            id_size: IdSize::Eight,
            strings: AHashMap::default(),
            classes: AHashMap::default(),
            histogram: AHashMap::default(),
            totals: Totals::default(),
        }
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The histogram, heaviest class first.
    pub fn entries(&self) -> Vec<Entry> {
        let mut out: Vec<Entry> = self
            .histogram
            .iter()
            .map(|(label, totals)| Entry {
                label: label.clone(),
                instance_count: totals.instance_count,
                shallow_bytes: totals.shallow_bytes,
            })
            .collect();
        out.sort_by(|a, b| b.shallow_bytes.cmp(&a.shallow_bytes));
        out
    }

    pub fn totals(&self) -> Totals {
        self.totals
    }

    fn resolve_class_name(&self, class_object_id: u64) -> String {
        let Some(info) = self.classes.get(&class_object_id) else {
            return format!("<unresolved class #{class_object_id:x}>");
        };
        if let Some(resolved) = &info.resolved_name {
            return resolved.clone();
        }
        info.name_id
            .and_then(|name_id| self.strings.get(&name_id))
            .cloned()
            .unwrap_or_else(|| format!("<unresolved class #{class_object_id:x}>"))
    }

    /// Sum of `class_object_id`'s own `instance_size` plus every ancestor's
    /// (`spec.md` §9): a `CLASS_DUMP`'s declared instance size only covers
    /// the fields that class itself adds, so the full shallow size of an
    /// instance requires walking `super_class_object_id` up to the root.
    /// `None` (treated by the caller as zero) means an ancestor's class
    /// dump was never observed.
    fn declared_fields_size(&self, class_object_id: u64) -> Option<u32> {
        let mut total = 0u32;
        let mut current = class_object_id;
        loop {
            let info = self.classes.get(&current)?;
            total += info.instance_size;
            if info.super_class_object_id == 0 {
                return Some(total);
            }
            current = info.super_class_object_id;
        }
    }

    fn record(&mut self, label: String, size: u32) {
        let entry = self.histogram.entry(label).or_default();
        entry.instance_count += 1;
        entry.shallow_bytes += size as u64;
        self.totals.shallow_bytes += size as u64;
    }
}

impl Visitor for Aggregator {
    fn header(&mut self, header: &Header) {
        self.id_size = header.id_size;
    }

    fn utf8(&mut self, id: u64, value: &str) {
        self.totals.string_count += 1;
        self.strings.insert(id, value.to_string());
    }

    fn load_class(
        &mut self,
        _class_serial: u32,
        class_object_id: u64,
        _stack_trace_serial: u32,
        class_name_id: u64,
    ) {
        self.classes.entry(class_object_id).or_default().name_id = Some(class_name_id);
    }

    fn gc_class_dump(&mut self, class_dump: &ClassDump) {
        self.totals.class_count += 1;
        let info = self.classes.entry(class_dump.class_object_id).or_default();
        info.super_class_object_id = class_dump.super_class_object_id;
        info.instance_size = class_dump.instance_size;
    }

    fn gc_instance_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        class_object_id: u64,
        _field_bytes: Option<&[u8]>,
    ) {
        self.totals.instance_count += 1;
        let header = object_header(self.id_size);
        let fields = self.declared_fields_size(class_object_id).unwrap_or_else(|| {
            warn!(class_object_id, "instance dump references a class with no class dump seen");
            0
        });
        let label = self.resolve_class_name(class_object_id);
        self.record(label, header + fields);
    }

    fn gc_obj_array_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        array_class_id: u64,
        elements: &[u64],
    ) {
        self.totals.object_array_count += 1;
        let size = array_header(self.id_size) + elements.len() as u32 * self.id_size.bytes();
        let element_class_name = self.resolve_class_name(array_class_id);
        self.record(format!("{element_class_name}[]"), size);
    }

    fn gc_prim_array_dump(
        &mut self,
        _object_id: u64,
        _stack_trace_serial: u32,
        elements: &PrimArrayElements,
    ) {
        self.totals.primitive_array_count += 1;
        let element_type = elements.element_type();
        let size = array_header(self.id_size) + elements.len() as u32 * value_size(element_type, self.id_size);
        let label = match element_type.jni_code() {
            Some(code) => format!("[{code}"),
            None => "[?".to_string(),
        };
        self.record(label, size);
    }

    /// All `UTF8`/`LOAD_CLASS` records precede the first heap dump, so
    /// every class name resolvable at all is resolvable now. Bake each
    /// known class's name into `ClassInfo` and drop the string table
    /// (`spec.md` §4.5): it would otherwise sit on the heap, unused, for
    /// the remainder of a potentially multi-gigabyte dump.
    fn heap_dump_start(&mut self) {
        let strings = &self.strings;
        for info in self.classes.values_mut() {
            if info.resolved_name.is_none() {
                info.resolved_name = info.name_id.and_then(|id| strings.get(&id).cloned());
            }
        }
        self.strings = AHashMap::default();
    }

    /// End of stream: the entry list is whatever `entries()` computes from
    /// `histogram`, which doesn't need `classes` any more either.
    fn end(&mut self) {
        self.classes = AHashMap::default();
    }
}
