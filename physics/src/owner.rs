/// Back-reference from a native body to the entity that owns it.
///
/// # Why this exists
/// Rapier lets us hang exactly one `u128` of user data on a rigid body. Collision reporting
/// and contact queries need to resolve a body back to game-level identity, so the owning
/// entity's generational id is packed into that slot.
///
/// # Bit layout
/// This `u128` is a packed value with the following layout (least-significant bit = bit 0):
///
/// - bits 0..=31   : entity slot index (u32)
/// - bits 32..=63  : entity generation (u32)
/// - bits 64..=71  : owner tag (u8), always [`ENTITY_TAG`] for now
/// - bits 72..=127 : reserved (must be zero for now)
///
/// # Invariants
/// - Two different `(index, generation)` pairs must never produce the same `Owner`.
/// - A body with rapier's default user data (`0`) has no owner: the tag is never zero.
pub type Owner = u128;

/// Tag stored in bits 64..=71 of every packed [`Owner`].
pub const ENTITY_TAG: u8 = 1;

const INDEX_BITS: u32 = u32::BITS;
const TAG_SHIFT: u32 = 64;
const RESERVED_MASK: u128 = !0u128 << 72; // bits 72..127 set

/// Packs an entity slot index and generation into an [`Owner`].
pub fn pack_owner(index: u32, generation: u32) -> Owner {
    (index as u128) | ((generation as u128) << INDEX_BITS) | ((ENTITY_TAG as u128) << TAG_SHIFT)
}

/// Safely extracts `(index, generation)` from an [`Owner`].
///
/// Returns `None` if the tag is missing/unknown or reserved bits are set (e.g. a body
/// created outside the runtime, or user data written by someone else).
pub fn unpack_owner(owner: Owner) -> Option<(u32, u32)> {
    validate_owner(owner).ok()?;
    let index = owner as u32;
    let generation = (owner >> INDEX_BITS) as u32;
    Some((index, generation))
}

/// Validates that an [`Owner`] conforms to the current packing contract.
///
/// Checks:
/// - reserved bits (72..=127) are zero
/// - owner tag is recognized
pub fn validate_owner(owner: Owner) -> Result<(), &'static str> {
    if (owner & RESERVED_MASK) != 0 {
        return Err("Owner reserved bits are non-zero");
    }
    let tag = ((owner >> TAG_SHIFT) & u8::MAX as u128) as u8;
    if tag != ENTITY_TAG {
        return Err("Owner has unknown tag");
    }
    Ok(())
}
