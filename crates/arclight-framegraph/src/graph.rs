//! Graph building, barrier compilation, and execution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::barrier::{self, Barrier};
use crate::device::{Command, CommandBuffer, RenderContext, RenderFrame};
use crate::pass::{PassBuilder, PassCallback, PassContext, TextureUsage, UsageDeclaration};
use crate::texture::{TextureHandle, TextureSettings};
use crate::FrameGraphError;

static GRAPH_TAG: AtomicU32 = AtomicU32::new(1);

/// Declares textures and passes, then compiles them into a
/// [`FrameGraph`].
#[derive(Debug)]
pub struct FrameGraphBuilder {
    tag: u32,
    textures: Vec<TextureSettings>,
    passes: Vec<PassBuilder>,
}

impl Default for FrameGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameGraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            tag: GRAPH_TAG.fetch_add(1, Ordering::Relaxed),
            textures: Vec::new(),
            passes: Vec::new(),
        }
    }

    /// Declares a texture; the handle is valid only within this
    /// builder and the graph it produces.
    pub fn create_texture(&mut self, settings: TextureSettings) -> TextureHandle {
        let index = self.textures.len() as u32;
        self.textures.push(settings);
        TextureHandle {
            index,
            graph: self.tag,
        }
    }

    /// Declares a pass; declaration order is execution order.
    pub fn add_pass(&mut self, name: impl Into<String>) -> &mut PassBuilder {
        self.passes.push(PassBuilder::new(name));
        self.passes.last_mut().expect("just pushed")
    }

    /// Compiles the declarations into an executable graph.
    ///
    /// Validation rejects malformed declarations; barrier computation
    /// is a linear scan per texture over the passes in declaration
    /// order, so the schedule is a pure function of the declarations.
    pub fn build(self) -> Result<FrameGraph, FrameGraphError> {
        self.validate()?;

        // Per texture: the ordered list of (pass index, usage).
        let mut uses: Vec<Vec<(usize, TextureUsage)>> = vec![Vec::new(); self.textures.len()];
        for (pass_index, pass) in self.passes.iter().enumerate() {
            for decl in &pass.usages {
                uses[decl.texture.index()].push((pass_index, decl.usage));
            }
        }

        let mut initial_barriers = Vec::new();
        let mut barriers_after: Vec<Vec<(TextureHandle, Barrier)>> =
            vec![Vec::new(); self.passes.len()];
        for (texture_index, uses) in uses.iter().enumerate() {
            let handle = TextureHandle {
                index: texture_index as u32,
                graph: self.tag,
            };
            if let Some(&(_, first_usage)) = uses.first() {
                initial_barriers.push((handle, barrier::initial_transition(first_usage)));
            }
            for window in uses.windows(2) {
                let (prev_pass, prev_usage) = window[0];
                let (_, next_usage) = window[1];
                if let Some(barrier) = barrier::transition(prev_usage, next_usage) {
                    barriers_after[prev_pass].push((handle, barrier));
                }
            }
        }

        let requires_render_frame = self.passes.iter().any(|p| p.to_render_frame);
        let passes = self
            .passes
            .into_iter()
            .map(|p| {
                let mut textures = HashMap::new();
                for decl in &p.usages {
                    textures.insert(decl.texture, self.textures[decl.texture.index()]);
                }
                Pass {
                    name: p.name,
                    usages: p.usages,
                    textures,
                    callback: p.callback.expect("validated"),
                    to_render_frame: p.to_render_frame,
                }
            })
            .collect();

        Ok(FrameGraph {
            tag: self.tag,
            textures: self.textures,
            passes,
            initial_barriers,
            barriers_after,
            requires_render_frame,
        })
    }

    fn validate(&self) -> Result<(), FrameGraphError> {
        let mut seen_names = std::collections::HashSet::new();
        for pass in &self.passes {
            if pass.name.is_empty() {
                return Err(FrameGraphError::EmptyPassName);
            }
            if !seen_names.insert(pass.name.as_str()) {
                return Err(FrameGraphError::DuplicatePass {
                    name: pass.name.clone(),
                });
            }
            if pass.callback.is_none() {
                return Err(FrameGraphError::MissingCallback {
                    pass: pass.name.clone(),
                });
            }
            let mut seen_textures: HashMap<TextureHandle, TextureUsage> = HashMap::new();
            for decl in &pass.usages {
                if decl.texture.graph != self.tag {
                    return Err(FrameGraphError::ForeignTexture {
                        pass: pass.name.clone(),
                    });
                }
                if decl.texture.index() >= self.textures.len() {
                    return Err(FrameGraphError::UnknownTexture {
                        pass: pass.name.clone(),
                    });
                }
                if let Some(previous) = seen_textures.insert(decl.texture, decl.usage) {
                    return if previous == decl.usage {
                        Err(FrameGraphError::DuplicateUsage {
                            pass: pass.name.clone(),
                        })
                    } else {
                        Err(FrameGraphError::ConflictingUsage {
                            pass: pass.name.clone(),
                        })
                    };
                }
                let format = self.textures[decl.texture.index()].format;
                if decl.usage == TextureUsage::Depth && !format.is_depth() {
                    return Err(FrameGraphError::DepthUsageOnColorFormat {
                        pass: pass.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("usages", &self.usages)
            .field("textures", &self.textures)
            .field("callback", &"<callback>")
            .field("to_render_frame", &self.to_render_frame)
            .finish()
    }
}

struct Pass {
    name: String,
    usages: Vec<UsageDeclaration>,
    textures: HashMap<TextureHandle, TextureSettings>,
    callback: PassCallback,
    to_render_frame: bool,
}

/// A compiled, executable schedule.
///
/// Re-enterable across frames: `execute` may be called repeatedly.
/// The declaration set is frozen — rebuilding means a new builder.
#[derive(Debug)]
pub struct FrameGraph {
    tag: u32,
    textures: Vec<TextureSettings>,
    passes: Vec<Pass>,
    initial_barriers: Vec<(TextureHandle, Barrier)>,
    barriers_after: Vec<Vec<(TextureHandle, Barrier)>>,
    requires_render_frame: bool,
}

impl FrameGraph {
    /// The number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name.as_str()).collect()
    }

    /// The settings a texture was declared with.
    pub fn texture_settings(
        &self,
        handle: TextureHandle,
    ) -> Result<&TextureSettings, FrameGraphError> {
        if handle.graph != self.tag {
            return Err(FrameGraphError::ForeignTexture {
                pass: String::new(),
            });
        }
        self.textures
            .get(handle.index())
            .ok_or(FrameGraphError::UnknownTexture {
                pass: String::new(),
            })
    }

    /// Whether any pass renders to the external render frame.
    pub fn requires_render_frame(&self) -> bool {
        self.requires_render_frame
    }

    /// Barriers applied before the first pass (initial layout
    /// transitions).
    pub fn initial_barriers(&self) -> &[(TextureHandle, Barrier)] {
        &self.initial_barriers
    }

    /// Barriers applied after the pass at `index`.
    pub fn barriers_after(&self, index: usize) -> &[(TextureHandle, Barrier)] {
        &self.barriers_after[index]
    }

    /// Executes every pass in declaration order, recording into `cmd`.
    ///
    /// A callback error aborts the remaining passes and propagates;
    /// already-recorded commands are not rolled back.
    pub fn execute(
        &mut self,
        cmd: &mut CommandBuffer,
        ctx: &mut RenderContext,
        frame: Option<&RenderFrame>,
    ) -> Result<(), FrameGraphError> {
        if self.requires_render_frame && frame.is_none() {
            let pass = self
                .passes
                .iter()
                .find(|p| p.to_render_frame)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return Err(FrameGraphError::MissingRenderFrame { pass });
        }

        for &(handle, barrier) in &self.initial_barriers {
            cmd.push(Command::ImageBarrier {
                texture: handle.index,
                barrier,
            });
        }

        for index in 0..self.passes.len() {
            let pass = &mut self.passes[index];
            cmd.push(Command::BeginTarget {
                pass: pass.name.clone(),
                external: pass.to_render_frame,
            });
            let mut pass_ctx = PassContext {
                pass: &pass.name,
                frame_index: ctx.frame_index(),
                textures: &pass.textures,
                cmd: &mut *cmd,
            };
            (pass.callback)(&mut pass_ctx)?;
            cmd.push(Command::EndTarget);

            for &(handle, barrier) in &self.barriers_after[index] {
                cmd.push(Command::ImageBarrier {
                    texture: handle.index,
                    barrier,
                });
            }
        }

        ctx.advance();
        Ok(())
    }

    /// The usage declarations of the pass at `index` (inspection).
    pub fn pass_usages(&self, index: usize) -> &[UsageDeclaration] {
        &self.passes[index].usages
    }
}
