//! Font identity and style matching

use std::hash::{Hash, Hasher};

use super::FontWeight;

/// Value identifying one font variant: family, weight, width and italic.
///
/// Slant angle is not part of the identity: it can be discovered
/// from a font file but never requested. Two identities that compare equal
/// refer to the same font resource even if they came from different files,
/// and the first one loaded wins.
#[derive(Debug, Clone, Copy)]
pub struct FontIdentity {
    family_hash: i32,
    weight: FontWeight,
    width: f32,
    is_italic: bool,
}

impl FontIdentity {
    /// Identity for a family name and style axes
    pub fn new(family: &str, weight: FontWeight, width: f32, is_italic: bool) -> Self {
        Self::from_hash(family_hash(family), weight, width, is_italic)
    }

    /// Identity from an already hashed family name
    pub fn from_hash(family_hash: i32, weight: FontWeight, width: f32, is_italic: bool) -> Self {
        let width = if width.is_finite() { width.clamp(50.0, 200.0) } else { 100.0 };
        Self { family_hash, weight, width, is_italic }
    }

    /// Regular upright identity of a family
    pub fn regular(family: &str) -> Self {
        Self::new(family, FontWeight::NORMAL, 100.0, false)
    }

    pub fn family_hash(&self) -> i32 {
        self.family_hash
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    /// Width in percent of normal (50..=200)
    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn is_italic(&self) -> bool {
        self.is_italic
    }

    /// Same identity with a different weight
    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    /// Same identity with italic switched on or off
    pub fn with_italic(mut self, is_italic: bool) -> Self {
        self.is_italic = is_italic;
        self
    }

    /// True when both identities name the same family, whatever their style
    pub fn same_family(&self, other: &FontIdentity) -> bool {
        self.family_hash == other.family_hash
    }
}

impl PartialEq for FontIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.family_hash == other.family_hash
            && self.weight == other.weight
            && self.width.to_bits() == other.width.to_bits()
            && self.is_italic == other.is_italic
    }
}

impl Eq for FontIdentity {}

impl Hash for FontIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.family_hash.hash(state);
        self.weight.hash(state);
        self.width.to_bits().hash(state);
        self.is_italic.hash(state);
    }
}

/// Stable 32-bit FNV-1a hash of a family name, case-insensitive
pub fn family_hash(family: &str) -> i32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET;
    for c in family.trim().chars().flat_map(char::to_lowercase) {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(PRIME);
        }
    }
    hash as i32
}

/// Find the candidate that best serves `requested`.
///
/// An exact match on all four identity fields wins. Otherwise the first
/// candidate of the same family is returned, so that a rich-text request for
/// a missing style (bold when only regular and italic are loaded) degrades to
/// a related face instead of failing layout. `None` when no candidate shares
/// the family.
pub fn resolve(requested: &FontIdentity, candidates: &[FontIdentity]) -> Option<usize> {
    candidates
        .iter()
        .position(|candidate| candidate == requested)
        .or_else(|| candidates.iter().position(|candidate| candidate.same_family(requested)))
}
