//! A declaration-order frame graph with barrier scheduling.
//!
//! Callers declare textures and passes (with per-texture usage kinds
//! and an execution callback), compile the declaration into a
//! [`FrameGraph`], and execute it each frame. Compilation resolves
//! read/write transitions into image barriers with a single linear
//! scan per texture; execution walks passes strictly in declaration
//! order — no automatic reordering — so schedules are reproducible and
//! debuggable, at the cost of requiring declarations in an
//! already-valid dependency order.
//!
//! One instance belongs to one rendering thread: building, compiling,
//! and executing must happen in strict sequence per frame.

mod barrier;
mod device;
mod graph;
mod pass;
mod texture;

pub use barrier::{AccessFlags, Barrier, ImageLayout, PipelineStage};
pub use device::{Command, CommandBuffer, RenderContext, RenderFrame};
pub use graph::{FrameGraph, FrameGraphBuilder};
pub use pass::{ClearValue, PassBuilder, PassContext, TextureUsage, UsageDeclaration};
pub use texture::{TextureFormat, TextureHandle, TextureSettings};

/// Frame-graph failures: declaration errors at build time, missing
/// collaborators or callback failures at execution time.
#[derive(Debug, thiserror::Error)]
pub enum FrameGraphError {
    #[error("pass declared with an empty name")]
    EmptyPassName,
    #[error("pass `{name}` declared twice")]
    DuplicatePass { name: String },
    #[error("pass `{pass}` has no execution callback")]
    MissingCallback { pass: String },
    #[error("pass `{pass}` references a texture from another graph")]
    ForeignTexture { pass: String },
    #[error("pass `{pass}` references an unknown texture")]
    UnknownTexture { pass: String },
    #[error("pass `{pass}` declares the same texture usage twice")]
    DuplicateUsage { pass: String },
    #[error("pass `{pass}` declares one texture with conflicting usages")]
    ConflictingUsage { pass: String },
    #[error("pass `{pass}` binds a color-format texture as depth")]
    DepthUsageOnColorFormat { pass: String },
    #[error("pass `{pass}` requires an external render frame and none was supplied")]
    MissingRenderFrame { pass: String },
    #[error("pass `{pass}` accessed a texture it did not declare")]
    UndeclaredTextureAccess { pass: String },
    #[error("pass `{pass}` failed: {message}")]
    PassFailed { pass: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn color_settings() -> TextureSettings {
        TextureSettings::new(640, 480, TextureFormat::Rgba8)
    }

    /// Two passes: P1 writes T as output, P2 samples T. The scenario
    /// from the scheduling contract: exactly one barrier on T between
    /// them, and P1 runs strictly before P2.
    #[test]
    fn write_then_read_produces_one_barrier_and_ordered_execution() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());

        let order_p1 = Rc::clone(&order);
        builder
            .add_pass("p1")
            .output(t)
            .execute(move |ctx| {
                order_p1.borrow_mut().push(ctx.pass_name().to_owned());
                Ok(())
            });
        let order_p2 = Rc::clone(&order);
        builder
            .add_pass("p2")
            .sampled(t)
            .execute(move |ctx| {
                order_p2.borrow_mut().push(ctx.pass_name().to_owned());
                Ok(())
            });

        let mut graph = builder.build().unwrap();

        // Exactly one barrier on T, scheduled after p1.
        assert_eq!(graph.barriers_after(0).len(), 1);
        assert!(graph.barriers_after(1).is_empty());
        let (handle, barrier) = graph.barriers_after(0)[0];
        assert_eq!(handle, t);
        assert_eq!(barrier.src_stage, PipelineStage::ColorAttachmentOutput);
        assert_eq!(barrier.dst_stage, PipelineStage::FragmentShader);
        assert_eq!(barrier.old_layout, ImageLayout::ColorAttachment);
        assert_eq!(barrier.new_layout, ImageLayout::ShaderReadOnly);

        let mut cmd = CommandBuffer::new();
        let mut ctx = RenderContext::new();
        graph.execute(&mut cmd, &mut ctx, None).unwrap();
        assert_eq!(*order.borrow(), vec!["p1".to_owned(), "p2".to_owned()]);

        // Recorded stream: initial transition, p1, barrier, p2.
        let commands = cmd.commands();
        assert!(matches!(commands[0], Command::ImageBarrier { .. }));
        assert!(matches!(
            &commands[1],
            Command::BeginTarget { pass, external: false } if pass == "p1"
        ));
        assert!(matches!(commands[2], Command::EndTarget));
        assert!(matches!(commands[3], Command::ImageBarrier { texture: 0, .. }));
        assert!(matches!(
            &commands[4],
            Command::BeginTarget { pass, .. } if pass == "p2"
        ));
    }

    #[test]
    fn same_usage_in_consecutive_passes_needs_no_barrier() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder.add_pass("a").sampled(t).execute(|_| Ok(()));
        builder.add_pass("b").sampled(t).execute(|_| Ok(()));
        let graph = builder.build().unwrap();
        assert!(graph.barriers_after(0).is_empty());
        assert!(graph.barriers_after(1).is_empty());
    }

    #[test]
    fn barrier_schedule_is_deterministic() {
        let build = || {
            let mut builder = FrameGraphBuilder::new();
            let color = builder.create_texture(color_settings());
            let depth = builder.create_texture(TextureSettings::new(
                640,
                480,
                TextureFormat::Depth32Float,
            ));
            builder
                .add_pass("gbuffer")
                .output(color)
                .depth(depth)
                .execute(|_| Ok(()));
            builder.add_pass("lighting").sampled(color).execute(|_| Ok(()));
            builder.build().unwrap()
        };
        let a = build();
        let b = build();
        for i in 0..a.pass_count() {
            let strip = |g: &FrameGraph, i: usize| -> Vec<Barrier> {
                g.barriers_after(i).iter().map(|&(_, b)| b).collect()
            };
            assert_eq!(strip(&a, i), strip(&b, i));
        }
    }

    #[test]
    fn clear_only_pass_gets_initial_transition() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder
            .add_pass("clear")
            .clear(t, ClearValue::default())
            .execute(|_| Ok(()));
        let graph = builder.build().unwrap();
        let initial = graph.initial_barriers();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].1.old_layout, ImageLayout::Undefined);
        assert_eq!(initial[0].1.new_layout, ImageLayout::TransferDst);
    }

    #[test]
    fn missing_render_frame_is_an_error() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder
            .add_pass("present")
            .sampled(t)
            .to_render_frame()
            .execute(|_| Ok(()));
        let mut graph = builder.build().unwrap();
        assert!(graph.requires_render_frame());

        let mut cmd = CommandBuffer::new();
        let mut ctx = RenderContext::new();
        match graph.execute(&mut cmd, &mut ctx, None) {
            Err(FrameGraphError::MissingRenderFrame { pass }) => assert_eq!(pass, "present"),
            other => panic!("expected MissingRenderFrame, got {other:?}"),
        }

        // Supplying the frame fixes it.
        graph
            .execute(&mut cmd, &mut ctx, Some(&RenderFrame { image_index: 0 }))
            .unwrap();
        assert!(cmd
            .commands()
            .iter()
            .any(|c| matches!(c, Command::BeginTarget { external: true, .. })));
    }

    #[test]
    fn callback_error_aborts_remaining_passes() {
        let ran = Rc::new(RefCell::new(Vec::new()));

        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        let ran_a = Rc::clone(&ran);
        builder.add_pass("a").output(t).execute(move |ctx| {
            ran_a.borrow_mut().push(ctx.pass_name().to_owned());
            Err(FrameGraphError::PassFailed {
                pass: ctx.pass_name().to_owned(),
                message: "secondary buffer lost".into(),
            })
        });
        let ran_b = Rc::clone(&ran);
        builder.add_pass("b").sampled(t).execute(move |ctx| {
            ran_b.borrow_mut().push(ctx.pass_name().to_owned());
            Ok(())
        });

        let mut graph = builder.build().unwrap();
        let mut cmd = CommandBuffer::new();
        let mut ctx = RenderContext::new();
        assert!(graph.execute(&mut cmd, &mut ctx, None).is_err());
        assert_eq!(*ran.borrow(), vec!["a".to_owned()]);
        // The aborted frame did not advance the frame index.
        assert_eq!(ctx.frame_index(), 0);
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let mut other = FrameGraphBuilder::new();
        let foreign = other.create_texture(color_settings());

        let mut builder = FrameGraphBuilder::new();
        builder.add_pass("p").sampled(foreign).execute(|_| Ok(()));
        match builder.build() {
            Err(FrameGraphError::ForeignTexture { pass }) => assert_eq!(pass, "p"),
            other => panic!("expected ForeignTexture, got {other:?}"),
        }
    }

    #[test]
    fn conflicting_usage_is_rejected() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder
            .add_pass("p")
            .output(t)
            .sampled(t)
            .execute(|_| Ok(()));
        assert!(matches!(
            builder.build(),
            Err(FrameGraphError::ConflictingUsage { .. })
        ));
    }

    #[test]
    fn depth_usage_requires_depth_format() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder.add_pass("p").depth(t).execute(|_| Ok(()));
        assert!(matches!(
            builder.build(),
            Err(FrameGraphError::DepthUsageOnColorFormat { .. })
        ));
    }

    #[test]
    fn pass_sees_only_declared_textures() {
        let mut builder = FrameGraphBuilder::new();
        let declared = builder.create_texture(color_settings());
        let undeclared = builder.create_texture(color_settings());
        builder.add_pass("p").sampled(declared).execute(move |ctx| {
            assert!(ctx.texture(declared).is_ok());
            match ctx.texture(undeclared) {
                Err(FrameGraphError::UndeclaredTextureAccess { .. }) => Ok(()),
                other => panic!("expected UndeclaredTextureAccess, got {other:?}"),
            }
        });
        let mut graph = builder.build().unwrap();
        let mut cmd = CommandBuffer::new();
        let mut ctx = RenderContext::new();
        graph.execute(&mut cmd, &mut ctx, None).unwrap();
    }

    #[test]
    fn execute_is_reenterable_across_frames() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder.add_pass("p").output(t).execute(|_| Ok(()));
        let mut graph = builder.build().unwrap();

        let mut ctx = RenderContext::new();
        for expected in 0..3u64 {
            let mut cmd = CommandBuffer::new();
            graph.execute(&mut cmd, &mut ctx, None).unwrap();
            assert_eq!(ctx.frame_index(), expected + 1);
        }
    }

    #[test]
    fn duplicate_pass_names_are_rejected() {
        let mut builder = FrameGraphBuilder::new();
        let t = builder.create_texture(color_settings());
        builder.add_pass("p").output(t).execute(|_| Ok(()));
        builder.add_pass("p").sampled(t).execute(|_| Ok(()));
        assert!(matches!(
            builder.build(),
            Err(FrameGraphError::DuplicatePass { .. })
        ));
    }
}
