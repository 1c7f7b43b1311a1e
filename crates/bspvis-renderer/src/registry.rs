// registry.rs - per-surface generation stamps and light interaction dedup
//
// Stamps are never cleared. A stamp that does not match the current
// counter reads as "nothing recorded yet", so moving to a new camera pass or
// light pass costs nothing per surface.

bitflags::bitflags! {
    /// What a light does to a surface.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InteractionBits: u8 {
        /// The surface receives light.
        const LIGHT   = 0x01;
        /// The surface casts a shadow.
        const SHADOW  = 0x02;
        const DEFAULT = Self::LIGHT.bits() | Self::SHADOW.bits();
    }
}

bitflags::bitflags! {
    /// Omni-light shadow cube faces a surface can appear in.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CubeSideBits: u8 {
        const POS_X   = 0x01;
        const NEG_X   = 0x02;
        const POS_Y   = 0x04;
        const NEG_Y   = 0x08;
        const POS_Z   = 0x10;
        const NEG_Z   = 0x20;
        const CLIPALL = 0x3f;
    }
}

/// Result of a successful [`SurfaceStamps::request_interactions`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteractionRequest {
    /// Kinds requested now that were not yet recorded for this light pass.
    pub new_bits: InteractionBits,
    /// First request of any kind for this surface in this light pass.
    pub first_addition: bool,
}

/// Mutable per-surface bookkeeping, kept beside the immutable surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SurfaceStamps {
    pub view_count: u32,
    pub light_count: u32,
    pub interaction_bits: InteractionBits,
}

impl SurfaceStamps {
    /// Stamp the surface for a camera pass. Returns false when it already
    /// carries this pass's stamp.
    #[inline]
    pub fn stamp_view(&mut self, view_count: u32) -> bool {
        if self.view_count == view_count {
            return false;
        }
        self.view_count = view_count;
        true
    }

    #[inline]
    pub fn seen_in_view(&self, view_count: u32) -> bool {
        self.view_count == view_count
    }

    /// Interaction kinds recorded during light pass `light_count`.
    pub fn accumulated_interactions(&self, light_count: u32) -> InteractionBits {
        if self.light_count == light_count {
            self.interaction_bits
        } else {
            InteractionBits::empty()
        }
    }

    /// Record `requested` for light pass `light_count`, resetting stale bits
    /// on first touch. Returns `None` when every requested kind was already
    /// recorded in this pass.
    pub fn request_interactions(
        &mut self,
        light_count: u32,
        requested: InteractionBits,
    ) -> Option<InteractionRequest> {
        let mut first_addition = false;
        if self.light_count != light_count {
            self.interaction_bits = InteractionBits::empty();
            self.light_count = light_count;
            first_addition = true;
        }

        let new_bits = requested & !self.interaction_bits;
        if new_bits.is_empty() {
            return None;
        }
        self.interaction_bits |= new_bits;

        Some(InteractionRequest {
            new_bits,
            first_addition,
        })
    }
}
