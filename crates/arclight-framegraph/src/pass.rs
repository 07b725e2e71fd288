//! Pass declarations and the per-pass execution context.

use std::collections::HashMap;
use std::fmt;

use crate::device::{Command, CommandBuffer};
use crate::texture::{TextureHandle, TextureSettings};
use crate::FrameGraphError;

/// How a pass uses a texture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TextureUsage {
    /// Read through a sampler.
    Sampled,
    /// Read as an input attachment.
    Input,
    /// Written as a color attachment.
    Output,
    /// Bound as the depth/stencil attachment.
    Depth,
    /// Filled with a clear value.
    Clear,
}

/// The value a `Clear` usage fills the texture with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValue {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// One declared texture usage within a pass.
#[derive(Clone, Copy, Debug)]
pub struct UsageDeclaration {
    pub texture: TextureHandle,
    pub usage: TextureUsage,
    pub clear: Option<ClearValue>,
}

/// The callback invoked when a pass executes.
pub type PassCallback = Box<dyn FnMut(&mut PassContext<'_>) -> Result<(), FrameGraphError>>;

/// A pass under construction, returned by
/// [`FrameGraphBuilder::add_pass`](crate::FrameGraphBuilder::add_pass).
pub struct PassBuilder {
    pub(crate) name: String,
    pub(crate) usages: Vec<UsageDeclaration>,
    pub(crate) callback: Option<PassCallback>,
    pub(crate) to_render_frame: bool,
}

impl fmt::Debug for PassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassBuilder")
            .field("name", &self.name)
            .field("usages", &self.usages)
            .field("to_render_frame", &self.to_render_frame)
            .finish_non_exhaustive()
    }
}

impl PassBuilder {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usages: Vec::new(),
            callback: None,
            to_render_frame: false,
        }
    }

    fn declare(&mut self, texture: TextureHandle, usage: TextureUsage) -> &mut Self {
        self.usages.push(UsageDeclaration {
            texture,
            usage,
            clear: None,
        });
        self
    }

    /// Declares a sampled read.
    pub fn sampled(&mut self, texture: TextureHandle) -> &mut Self {
        self.declare(texture, TextureUsage::Sampled)
    }

    /// Declares an input-attachment read.
    pub fn input(&mut self, texture: TextureHandle) -> &mut Self {
        self.declare(texture, TextureUsage::Input)
    }

    /// Declares a color-attachment write.
    pub fn output(&mut self, texture: TextureHandle) -> &mut Self {
        self.declare(texture, TextureUsage::Output)
    }

    /// Declares the depth/stencil attachment.
    pub fn depth(&mut self, texture: TextureHandle) -> &mut Self {
        self.declare(texture, TextureUsage::Depth)
    }

    /// Declares a clear.
    pub fn clear(&mut self, texture: TextureHandle, value: ClearValue) -> &mut Self {
        self.usages.push(UsageDeclaration {
            texture,
            usage: TextureUsage::Clear,
            clear: Some(value),
        });
        self
    }

    /// Flags this pass as rendering to the caller-supplied render
    /// frame (the swap-chain surface).
    pub fn to_render_frame(&mut self) -> &mut Self {
        self.to_render_frame = true;
        self
    }

    /// Supplies the execution callback.
    pub fn execute(
        &mut self,
        callback: impl FnMut(&mut PassContext<'_>) -> Result<(), FrameGraphError> + 'static,
    ) -> &mut Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

/// What a pass callback may touch: the textures it declared and the
/// command buffer being recorded.
pub struct PassContext<'a> {
    pub(crate) pass: &'a str,
    pub(crate) frame_index: u64,
    pub(crate) textures: &'a HashMap<TextureHandle, TextureSettings>,
    pub(crate) cmd: &'a mut CommandBuffer,
}

impl PassContext<'_> {
    /// The executing pass's name.
    pub fn pass_name(&self) -> &str {
        self.pass
    }

    /// The current frame index.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Resolves a texture declared by this pass. Undeclared handles
    /// are rejected: a pass only sees what it registered.
    pub fn texture(&self, handle: TextureHandle) -> Result<&TextureSettings, FrameGraphError> {
        self.textures
            .get(&handle)
            .ok_or_else(|| FrameGraphError::UndeclaredTextureAccess {
                pass: self.pass.to_owned(),
            })
    }

    /// Records a marker into the command stream (stands in for real
    /// draw submission in this crate).
    pub fn marker(&mut self, label: impl Into<String>) {
        self.cmd.push(Command::Marker {
            pass: self.pass.to_owned(),
            label: label.into(),
        });
    }
}
