//! Bit-compressed clause storage backend.
//!
//! Clauses are packed into per-class bit buffers. A class is determined by the learnt flag, the
//! bit width of the size field and the bit width of a single literal; the class code is part of
//! every [`ClauseRef`] produced by this backend, so all field extraction parameters can be
//! derived from the reference alone using the precomputed mask/shift tables below.
//!
//! Within its buffer a clause is stored as `size, [protect, glue, activity,] literals` at the
//! class' field widths. Literal slots hold the literal code plus one, leaving the value 0 free
//! as the deleted-chunk marker: a deleted clause keeps its size field, so a compaction pass can
//! walk a buffer without any external table.
use kitesat_formula::Lit;

use super::{ClauseRef, StoreFull};

/// Selectable widths of the clause size field.
const SIZE_BITS: [u32; 4] = [4, 8, 16, 28];

/// Selectable widths of a single literal slot.
const LIT_BITS: [u32; 8] = [6, 9, 12, 15, 18, 21, 26, 32];

/// Bits of a [`ClauseRef`] code used for the word offset within a class buffer.
const OFFSET_BITS: u32 = 25;

/// Bits used to store the clause activity.
const ACTIVITY_BITS: u32 = 32;

/// Number of distinct storage classes.
const CLASS_COUNT: usize = 2 * SIZE_BITS.len() * LIT_BITS.len();

/// Decoded parameters of a storage class.
#[derive(Copy, Clone)]
struct ClassInfo {
    learnt: bool,
    size_bits: u32,
    lit_bits: u32,
    /// Bit offset of the first literal slot relative to the chunk start.
    lits_offset: u32,
}

impl ClassInfo {
    fn from_code(code: u32) -> ClassInfo {
        let learnt = code & 1 != 0;
        let size_bits = SIZE_BITS[(code as usize >> 1) & 3];
        let lit_bits = LIT_BITS[(code as usize >> 3) & 7];
        let lits_offset = if learnt {
            // protect flag, glue at size width, activity
            size_bits + 1 + size_bits + ACTIVITY_BITS
        } else {
            size_bits
        };
        ClassInfo {
            learnt,
            size_bits,
            lit_bits,
            lits_offset,
        }
    }

    /// Class code for a clause with the given shape, if it is representable.
    fn code_for(learnt: bool, len: usize, max_lit_code: usize) -> Option<u32> {
        let size_class = SIZE_BITS
            .iter()
            .position(|&bits| len < (1usize << bits))?;
        // Literal slots store code + 1
        let lit_class = LIT_BITS
            .iter()
            .position(|&bits| bits == 32 || max_lit_code + 1 < (1usize << bits))?;
        Some((learnt as u32) | ((size_class as u32) << 1) | ((lit_class as u32) << 3))
    }

    /// Total chunk size in bits for a clause of the given length.
    fn chunk_bits(&self, len: usize) -> usize {
        self.lits_offset as usize + len * self.lit_bits as usize
    }

    /// Total chunk size in whole words for a clause of the given length.
    fn chunk_words(&self, len: usize) -> usize {
        (self.chunk_bits(len) + 31) / 32
    }
}

/// Read `width` bits at the given bit position.
fn get_bits(words: &[u32], pos: usize, width: u32) -> u32 {
    debug_assert!(width >= 1 && width <= 32);
    let word = pos / 32;
    let bit = pos % 32;
    let mut value = (words[word] >> bit) as u64;
    if bit + width as usize > 32 {
        value |= (words[word + 1] as u64) << (32 - bit);
    }
    (value & ((1u64 << width) - 1)) as u32
}

/// Overwrite `width` bits at the given bit position.
fn set_bits(words: &mut [u32], pos: usize, width: u32, value: u32) {
    debug_assert!(width >= 1 && width <= 32);
    debug_assert!(width == 32 || value < (1 << width));
    let word = pos / 32;
    let bit = pos % 32;
    let mask = ((1u64 << width) - 1) as u64;

    let mut combined = words[word] as u64;
    if bit + width as usize > 32 {
        combined |= (words[word + 1] as u64) << 32;
    }
    combined = (combined & !(mask << bit)) | ((value as u64) << bit);

    words[word] = combined as u32;
    if bit + width as usize > 32 {
        words[word + 1] = (combined >> 32) as u32;
    }
}

/// Bit-compressed bump allocator for clause storage.
///
/// One bit buffer per storage class, created on first use. Deleted clauses stay in place as
/// wasted space until a compaction rebuilds the buffers.
#[derive(Default)]
pub struct PackedAlloc {
    bufs: Vec<Vec<u32>>,
}

impl PackedAlloc {
    /// Create an empty compressed allocator.
    pub fn new() -> PackedAlloc {
        PackedAlloc {
            bufs: vec![vec![]; CLASS_COUNT],
        }
    }

    fn split_ref(cref: ClauseRef) -> (u32, usize, usize) {
        let class_code = cref.code() >> OFFSET_BITS;
        let word_offset = (cref.code() & ((1 << OFFSET_BITS) - 1)) as usize;
        (class_code, word_offset, word_offset * 32)
    }

    fn buf(&self, class_code: u32) -> &[u32] {
        &self.bufs[class_code as usize]
    }

    fn buf_mut(&mut self, class_code: u32) -> &mut [u32] {
        &mut self.bufs[class_code as usize]
    }

    /// Allocate space for and add a new clause.
    ///
    /// Like the word backend this only stores ternary and larger clauses.
    pub fn add_clause(
        &mut self,
        learnt: bool,
        glue: u32,
        lits: &[Lit],
    ) -> Result<ClauseRef, StoreFull> {
        assert!(
            lits.len() >= 3,
            "PackedAlloc can only store ternary and larger clauses"
        );

        if self.bufs.is_empty() {
            self.bufs = vec![vec![]; CLASS_COUNT];
        }

        let max_lit_code = lits.iter().map(|lit| lit.code()).max().unwrap();
        let class_code =
            ClassInfo::code_for(learnt, lits.len(), max_lit_code).ok_or(StoreFull)?;
        let info = ClassInfo::from_code(class_code);

        let buf = &mut self.bufs[class_code as usize];
        let word_offset = buf.len();
        if word_offset >= (1 << OFFSET_BITS) {
            return Err(StoreFull);
        }

        buf.resize(word_offset + info.chunk_words(lits.len()), 0);

        let base = word_offset * 32;
        set_bits(buf, base, info.size_bits, lits.len() as u32);
        if learnt {
            let glue_pos = base + info.size_bits as usize + 1;
            set_bits(buf, glue_pos, info.size_bits, glue.min((1 << info.size_bits) - 1));
        }
        for (i, &lit) in lits.iter().enumerate() {
            let pos = base + info.lits_offset as usize + i * info.lit_bits as usize;
            set_bits(buf, pos, info.lit_bits, lit.code() as u32 + 1);
        }

        Ok(ClauseRef::from_code(
            (class_code << OFFSET_BITS) | word_offset as u32,
        ))
    }

    /// Length of a clause.
    pub fn len(&self, cref: ClauseRef) -> usize {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        get_bits(self.buf(class_code), base, info.size_bits) as usize
    }

    /// Whether the clause was learnt.
    pub fn is_learnt(&self, cref: ClauseRef) -> bool {
        let (class_code, _, _) = Self::split_ref(cref);
        class_code & 1 != 0
    }

    /// Glue level of a learnt clause, 0 for initial clauses.
    pub fn glue(&self, cref: ClauseRef) -> u32 {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        if !info.learnt {
            return 0;
        }
        get_bits(
            self.buf(class_code),
            base + info.size_bits as usize + 1,
            info.size_bits,
        )
    }

    /// Set the glue level of a learnt clause.
    pub fn set_glue(&mut self, cref: ClauseRef, glue: u32) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(info.learnt);
        let glue = glue.min((1 << info.size_bits) - 1);
        set_bits(
            self.buf_mut(class_code),
            base + info.size_bits as usize + 1,
            info.size_bits,
            glue,
        );
    }

    /// Whether the clause is exempt from the next deletion pass.
    pub fn protected(&self, cref: ClauseRef) -> bool {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        info.learnt && get_bits(self.buf(class_code), base + info.size_bits as usize, 1) != 0
    }

    /// Exempt a learnt clause from the next deletion pass.
    pub fn set_protected(&mut self, cref: ClauseRef, protect: bool) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(info.learnt);
        set_bits(
            self.buf_mut(class_code),
            base + info.size_bits as usize,
            1,
            protect as u32,
        );
    }

    /// Activity of a learnt clause.
    pub fn activity(&self, cref: ClauseRef) -> f32 {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        if !info.learnt {
            return 0.0;
        }
        let pos = base + (info.size_bits + 1 + info.size_bits) as usize;
        f32::from_bits(get_bits(self.buf(class_code), pos, ACTIVITY_BITS))
    }

    /// Set the activity of a learnt clause.
    pub fn set_activity(&mut self, cref: ClauseRef, activity: f32) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(info.learnt);
        let pos = base + (info.size_bits + 1 + info.size_bits) as usize;
        set_bits(self.buf_mut(class_code), pos, ACTIVITY_BITS, activity.to_bits());
    }

    /// Whether the clause is marked as deleted.
    pub fn deleted(&self, cref: ClauseRef) -> bool {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        get_bits(
            self.buf(class_code),
            base + info.lits_offset as usize,
            info.lit_bits,
        ) == 0
    }

    /// Mark the clause as deleted.
    ///
    /// The size field stays intact so the chunk length remains computable.
    pub fn set_deleted(&mut self, cref: ClauseRef) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        set_bits(
            self.buf_mut(class_code),
            base + info.lits_offset as usize,
            info.lit_bits,
            0,
        );
    }

    /// The literal at the given position.
    pub fn lit(&self, cref: ClauseRef, index: usize) -> Lit {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(index < self.len(cref));
        let pos = base + info.lits_offset as usize + index * info.lit_bits as usize;
        let raw = get_bits(self.buf(class_code), pos, info.lit_bits);
        debug_assert!(raw != 0, "reading a deleted clause");
        Lit::from_code(raw as usize - 1)
    }

    /// Overwrite the literal at the given position.
    ///
    /// The literal must fit the clause's class, which holds for any literal already present in
    /// a clause of the same class.
    pub fn set_lit(&mut self, cref: ClauseRef, index: usize, lit: Lit) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(index < self.len(cref));
        debug_assert!(info.lit_bits == 32 || lit.code() + 1 < (1 << info.lit_bits));
        let pos = base + info.lits_offset as usize + index * info.lit_bits as usize;
        set_bits(self.buf_mut(class_code), pos, info.lit_bits, lit.code() as u32 + 1);
    }

    /// Shrink the stored length of a clause.
    pub fn set_len(&mut self, cref: ClauseRef, len: usize) {
        let (class_code, _, base) = Self::split_ref(cref);
        let info = ClassInfo::from_code(class_code);
        debug_assert!(len <= self.len(cref));
        set_bits(self.buf_mut(class_code), base, info.size_bits, len as u32);
    }

    /// Number of words the clause's chunk occupies in its buffer.
    pub fn chunk_words(&self, cref: ClauseRef) -> usize {
        let (class_code, _, _) = Self::split_ref(cref);
        ClassInfo::from_code(class_code).chunk_words(self.len(cref))
    }

    /// Total buffer size over all classes in words.
    pub fn buffer_size(&self) -> usize {
        self.bufs.iter().map(|buf| buf.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kitesat_formula::cnf::strategy::*;

    use proptest::*;

    #[test]
    fn bit_field_roundtrip() {
        let mut words = vec![0u32; 4];
        set_bits(&mut words, 3, 7, 0x55);
        set_bits(&mut words, 30, 12, 0xabc);
        set_bits(&mut words, 64, 32, 0xdeadbeef);

        assert_eq!(get_bits(&words, 3, 7), 0x55);
        assert_eq!(get_bits(&words, 30, 12), 0xabc);
        assert_eq!(get_bits(&words, 64, 32), 0xdeadbeef);

        // Overwriting keeps the neighbors intact
        set_bits(&mut words, 30, 12, 0x123);
        assert_eq!(get_bits(&words, 3, 7), 0x55);
        assert_eq!(get_bits(&words, 30, 12), 0x123);
        assert_eq!(get_bits(&words, 64, 32), 0xdeadbeef);
    }

    proptest! {
        #[test]
        fn roundtrip_and_metadata(input in cnf_formula(1..200usize, 0..300, 3..40)) {
            let mut alloc = PackedAlloc::new();
            let mut crefs = vec![];

            for (i, lits) in input.iter().enumerate() {
                let learnt = i % 2 == 0;
                let cref = alloc.add_clause(learnt, 3, lits).unwrap();
                prop_assert_eq!(alloc.is_learnt(cref), learnt);
                crefs.push(cref);
            }

            for (cref, lits) in crefs.iter().zip(input.iter()) {
                prop_assert_eq!(alloc.len(*cref), lits.len());
                for (i, &lit) in lits.iter().enumerate() {
                    prop_assert_eq!(alloc.lit(*cref, i), lit);
                }
                if alloc.is_learnt(*cref) {
                    prop_assert_eq!(alloc.glue(*cref), 3);
                    prop_assert!(!alloc.protected(*cref));
                }
                prop_assert!(!alloc.deleted(*cref));
            }
        }

        #[test]
        fn learnt_metadata_updates(input in cnf_formula(1..50usize, 1..50, 3..10)) {
            let mut alloc = PackedAlloc::new();

            for lits in input.iter() {
                let cref = alloc.add_clause(true, lits.len() as u32, lits).unwrap();

                alloc.set_glue(cref, 2);
                alloc.set_activity(cref, 1.5);
                alloc.set_protected(cref, true);

                prop_assert_eq!(alloc.glue(cref), 2);
                prop_assert_eq!(alloc.activity(cref), 1.5);
                prop_assert!(alloc.protected(cref));

                // Literal content survives metadata updates
                for (i, &lit) in lits.iter().enumerate() {
                    prop_assert_eq!(alloc.lit(cref, i), lit);
                }

                alloc.set_deleted(cref);
                prop_assert!(alloc.deleted(cref));
                prop_assert_eq!(alloc.len(cref), lits.len());
            }
        }
    }
}
