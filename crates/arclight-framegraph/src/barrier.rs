//! Synchronization primitives: stages, access flags, layouts, barriers.

use crate::pass::TextureUsage;

/// A pipeline stage, the scope of a barrier's source or destination.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PipelineStage {
    TopOfPipe,
    EarlyFragmentTests,
    FragmentShader,
    ColorAttachmentOutput,
    Transfer,
}

/// Bitflags for memory access kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct AccessFlags(u32);

impl AccessFlags {
    pub const NONE: Self = Self(0);
    pub const SHADER_READ: Self = Self(1);
    pub const INPUT_ATTACHMENT_READ: Self = Self(1 << 1);
    pub const COLOR_ATTACHMENT_WRITE: Self = Self(1 << 2);
    pub const DEPTH_STENCIL_WRITE: Self = Self(1 << 3);
    pub const TRANSFER_WRITE: Self = Self(1 << 4);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if any write flag is set.
    pub fn is_write(self) -> bool {
        let writes = Self::COLOR_ATTACHMENT_WRITE.0
            | Self::DEPTH_STENCIL_WRITE.0
            | Self::TRANSFER_WRITE.0;
        self.0 & writes != 0
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Image memory layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ImageLayout {
    Undefined,
    ShaderReadOnly,
    ColorAttachment,
    DepthStencilAttachment,
    TransferDst,
}

/// A synchronization point between two uses of one texture.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Barrier {
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
}

/// The (stage, access, layout) triple a usage kind implies.
pub(crate) fn usage_sync(usage: TextureUsage) -> (PipelineStage, AccessFlags, ImageLayout) {
    match usage {
        TextureUsage::Sampled => (
            PipelineStage::FragmentShader,
            AccessFlags::SHADER_READ,
            ImageLayout::ShaderReadOnly,
        ),
        TextureUsage::Input => (
            PipelineStage::FragmentShader,
            AccessFlags::INPUT_ATTACHMENT_READ,
            ImageLayout::ShaderReadOnly,
        ),
        TextureUsage::Output => (
            PipelineStage::ColorAttachmentOutput,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            ImageLayout::ColorAttachment,
        ),
        TextureUsage::Depth => (
            PipelineStage::EarlyFragmentTests,
            AccessFlags::DEPTH_STENCIL_WRITE,
            ImageLayout::DepthStencilAttachment,
        ),
        TextureUsage::Clear => (
            PipelineStage::Transfer,
            AccessFlags::TRANSFER_WRITE,
            ImageLayout::TransferDst,
        ),
    }
}

/// Computes the barrier between two consecutive uses, or `None` when
/// neither layout nor access changes (read-after-read with the same
/// usage kind needs no synchronization).
pub(crate) fn transition(from: TextureUsage, to: TextureUsage) -> Option<Barrier> {
    let (src_stage, src_access, old_layout) = usage_sync(from);
    let (dst_stage, dst_access, new_layout) = usage_sync(to);
    if old_layout == new_layout && src_access == dst_access {
        return None;
    }
    Some(Barrier {
        src_stage,
        dst_stage,
        src_access,
        dst_access,
        old_layout,
        new_layout,
    })
}

/// The transition from an undefined image to its first use.
pub(crate) fn initial_transition(to: TextureUsage) -> Barrier {
    let (dst_stage, dst_access, new_layout) = usage_sync(to);
    Barrier {
        src_stage: PipelineStage::TopOfPipe,
        dst_stage,
        src_access: AccessFlags::NONE,
        dst_access,
        old_layout: ImageLayout::Undefined,
        new_layout,
    }
}
