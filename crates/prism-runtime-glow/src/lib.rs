//! prism backend (glow/OpenGL)
//
// This crate contains **only** the GL side of the runtime:
// - compile/link shader stages, query the active-resource directories
// - manage offscreen render targets (FBO + texture)
// - run fullscreen passes and clear the default target
//
// It does NOT contain graph policy, hot-reload policy, mode control or
// windowing; all of that lives above the `RenderBackend` seam. The host owns
// the GL context lifecycle and the single rendering thread.
#![allow(clippy::missing_safety_doc)]

use glow::HasContext;

use prism_core::{RenderError, UniformValue};
use prism_graph::TargetFormat;
use prism_runtime::{
    AttributeInfo, CompiledStage, LinkedProgram, PassOp, PassTarget, RenderBackend, UniformInfo,
};
use prism_shader::{StageKind, StageSource};

pub use prism_core::RenderError as Error;

/// Offscreen render target (FBO + color texture).
#[derive(Debug)]
pub struct RenderTarget {
    pub fbo: glow::NativeFramebuffer,
    pub tex: glow::NativeTexture,
    pub w: i32,
    pub h: i32,
    format: TargetFormat,
}

fn gl_format(format: TargetFormat) -> (i32, u32, u32) {
    match format {
        TargetFormat::Rgba8 => (glow::RGBA8 as i32, glow::RGBA, glow::UNSIGNED_BYTE),
        TargetFormat::Rgba16F => (glow::RGBA16F as i32, glow::RGBA, glow::HALF_FLOAT),
    }
}

fn gl_stage(kind: StageKind) -> u32 {
    match kind {
        StageKind::Vertex => glow::VERTEX_SHADER,
        StageKind::Geometry => glow::GEOMETRY_SHADER,
        StageKind::Fragment => glow::FRAGMENT_SHADER,
    }
}

/// GLSL spelling of an active-resource type enum, for the directories.
fn glsl_type_name(gl_type: u32) -> String {
    match gl_type {
        glow::FLOAT => "float".to_string(),
        glow::FLOAT_VEC2 => "vec2".to_string(),
        glow::FLOAT_VEC3 => "vec3".to_string(),
        glow::FLOAT_VEC4 => "vec4".to_string(),
        glow::INT => "int".to_string(),
        glow::INT_VEC2 => "ivec2".to_string(),
        glow::INT_VEC3 => "ivec3".to_string(),
        glow::INT_VEC4 => "ivec4".to_string(),
        glow::BOOL => "bool".to_string(),
        glow::FLOAT_MAT2 => "mat2".to_string(),
        glow::FLOAT_MAT3 => "mat3".to_string(),
        glow::FLOAT_MAT4 => "mat4".to_string(),
        glow::SAMPLER_2D => "sampler2D".to_string(),
        glow::SAMPLER_3D => "sampler3D".to_string(),
        glow::SAMPLER_CUBE => "samplerCube".to_string(),
        other => format!("0x{other:x}"),
    }
}

/// Re-anchor diagnostics to the multi-stage blob: a `#line` directive
/// carrying the stage's position, placed after `#version` when present
/// (nothing may precede `#version`).
fn with_line_directive(stage: &StageSource) -> String {
    let mut parts = stage.text.splitn(2, '\n');
    let first = parts.next().unwrap_or("");
    if first.trim_start().starts_with("#version") {
        let rest = parts.next().unwrap_or("");
        format!("{first}\n#line {}\n{rest}", stage.first_line + 1)
    } else {
        format!("#line {}\n{}", stage.first_line, stage.text)
    }
}

// --- Fullscreen draw helper ---
#[derive(Debug)]
pub struct FullscreenTriangle {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl FullscreenTriangle {
    pub unsafe fn new(gl: &glow::Context) -> Result<Self, RenderError> {
        // One oversized triangle: positions interleaved with UVs.
        let verts: [f32; 12] = [
            -1.0, -1.0, 0.0, 0.0, 3.0, -1.0, 2.0, 0.0, -1.0, 3.0, 0.0, 2.0,
        ];

        let vao = gl
            .create_vertex_array()
            .map_err(|e| RenderError::GlCreate(format!("create_vertex_array: {e}")))?;
        let vbo = gl
            .create_buffer()
            .map_err(|e| RenderError::GlCreate(format!("create_buffer: {e}")))?;

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&verts),
            glow::STATIC_DRAW,
        );

        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 4 * 4, 0);

        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 4 * 4, 2 * 4);

        gl.bind_buffer(glow::ARRAY_BUFFER, None);
        gl.bind_vertex_array(None);

        Ok(Self { vao, vbo })
    }

    pub unsafe fn draw(&self, gl: &glow::Context) {
        gl.bind_vertex_array(Some(self.vao));
        gl.draw_arrays(glow::TRIANGLES, 0, 3);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}

/// The OpenGL backend.
///
/// Owns the `glow::Context` and the fullscreen geometry. All GPU objects it
/// hands out (shaders, programs, targets) come back through the
/// `destroy_*` methods; nothing is reclaimed behind the runtime's back.
pub struct GlBackend {
    gl: glow::Context,
    fs_tri: FullscreenTriangle,
}

impl std::fmt::Debug for GlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlBackend")
            .field("fs_tri", &self.fs_tri)
            .finish()
    }
}

impl GlBackend {
    /// # Safety
    ///
    /// The context must be current on the calling thread and stay current
    /// for every later call into this backend.
    pub unsafe fn new(gl: glow::Context) -> Result<Self, RenderError> {
        let fs_tri = FullscreenTriangle::new(&gl)?;
        Ok(GlBackend { gl, fs_tri })
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Release the objects the backend itself owns and hand the context back.
    pub unsafe fn destroy(mut self) -> glow::Context {
        self.fs_tri.destroy(&self.gl);
        self.gl
    }

    unsafe fn alloc_target_storage(&self, target: &RenderTarget) {
        let (internal, format, ty) = gl_format(target.format);
        self.gl.bind_texture(glow::TEXTURE_2D, Some(target.tex));
        self.gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            internal,
            target.w,
            target.h,
            0,
            format,
            ty,
            None,
        );
        self.gl.bind_texture(glow::TEXTURE_2D, None);
    }
}

impl RenderBackend for GlBackend {
    type StageHandle = glow::NativeShader;
    type ProgramHandle = glow::NativeProgram;
    type Target = RenderTarget;
    type UniformLocation = glow::NativeUniformLocation;

    fn compile_stage(
        &mut self,
        stage: &StageSource,
        origin: &str,
    ) -> Result<CompiledStage<glow::NativeShader>, RenderError> {
        unsafe {
            let gl = &self.gl;
            let shader = gl.create_shader(gl_stage(stage.kind)).map_err(|e| {
                RenderError::GlCreate(format!("create_shader({}): {e}", stage.kind.name()))
            })?;

            gl.shader_source(shader, &with_line_directive(stage));
            gl.compile_shader(shader);

            let info_log = gl.get_shader_info_log(shader);
            if !gl.get_shader_compile_status(shader) {
                gl.delete_shader(shader);
                return Err(RenderError::Compile {
                    stage: stage.kind.name(),
                    origin: origin.to_string(),
                    log: info_log,
                });
            }

            let mut diagnostics = Vec::new();
            if !info_log.trim().is_empty() {
                diagnostics.push(info_log);
            }

            Ok(CompiledStage {
                kind: stage.kind,
                handle: shader,
                diagnostics,
            })
        }
    }

    fn destroy_stage(&mut self, stage: CompiledStage<glow::NativeShader>) {
        unsafe { self.gl.delete_shader(stage.handle) }
    }

    fn link_program(
        &mut self,
        stages: Vec<CompiledStage<glow::NativeShader>>,
        origin: &str,
    ) -> Result<LinkedProgram<Self>, RenderError> {
        unsafe {
            let gl = &self.gl;
            let program = match gl.create_program() {
                Ok(p) => p,
                Err(e) => {
                    for s in stages {
                        gl.delete_shader(s.handle);
                    }
                    return Err(RenderError::GlCreate(format!("create_program: {e}")));
                }
            };

            let mut diagnostics = Vec::new();
            for s in &stages {
                gl.attach_shader(program, s.handle);
                diagnostics.extend(s.diagnostics.iter().cloned());
            }
            gl.link_program(program);

            // Shaders are owned by the link attempt either way.
            for s in &stages {
                gl.detach_shader(program, s.handle);
                gl.delete_shader(s.handle);
            }

            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderError::Link {
                    origin: origin.to_string(),
                    log,
                });
            }

            let mut uniforms = std::collections::BTreeMap::new();
            for i in 0..gl.get_active_uniforms(program) {
                let Some(active) = gl.get_active_uniform(program, i) else {
                    continue;
                };
                if active.name.starts_with("gl_") {
                    continue;
                }
                let Some(location) = gl.get_uniform_location(program, &active.name) else {
                    continue;
                };
                // Arrays report as `name[0]`; the directory keys the base name.
                let name = active.name.trim_end_matches("[0]").to_string();
                uniforms.insert(
                    name,
                    UniformInfo {
                        ty: glsl_type_name(active.utype),
                        location,
                    },
                );
            }

            let mut attributes = std::collections::BTreeMap::new();
            for i in 0..gl.get_active_attributes(program) {
                let Some(active) = gl.get_active_attribute(program, i) else {
                    continue;
                };
                if active.name.starts_with("gl_") {
                    continue;
                }
                let Some(location) = gl.get_attrib_location(program, &active.name) else {
                    continue;
                };
                attributes.insert(
                    active.name.clone(),
                    AttributeInfo {
                        ty: glsl_type_name(active.atype),
                        location,
                    },
                );
            }

            Ok(LinkedProgram {
                handle: program,
                uniforms,
                attributes,
                diagnostics,
            })
        }
    }

    fn destroy_program(&mut self, program: LinkedProgram<Self>) {
        unsafe { self.gl.delete_program(program.handle) }
    }

    fn create_target(
        &mut self,
        width: i32,
        height: i32,
        format: TargetFormat,
    ) -> Result<RenderTarget, RenderError> {
        unsafe {
            let gl = &self.gl;
            let fbo = gl
                .create_framebuffer()
                .map_err(|e| RenderError::GlCreate(format!("create_framebuffer: {e}")))?;
            let tex = match gl.create_texture() {
                Ok(t) => t,
                Err(e) => {
                    gl.delete_framebuffer(fbo);
                    return Err(RenderError::GlCreate(format!("create_texture: {e}")));
                }
            };

            let target = RenderTarget {
                fbo,
                tex,
                w: width.max(1),
                h: height.max(1),
                format,
            };

            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            self.alloc_target_storage(&target);

            let gl = &self.gl;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(tex),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                gl.delete_framebuffer(fbo);
                gl.delete_texture(tex);
                return Err(RenderError::GlCreate(format!(
                    "framebuffer incomplete: 0x{status:x}"
                )));
            }

            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            Ok(target)
        }
    }

    fn resize_target(
        &mut self,
        target: &mut RenderTarget,
        width: i32,
        height: i32,
    ) -> Result<(), RenderError> {
        // Realloc texture storage in place; FBO/texture ids stay stable.
        target.w = width.max(1);
        target.h = height.max(1);
        unsafe { self.alloc_target_storage(target) };
        Ok(())
    }

    fn destroy_target(&mut self, target: RenderTarget) {
        unsafe {
            self.gl.delete_framebuffer(target.fbo);
            self.gl.delete_texture(target.tex);
        }
    }

    fn target_size(&self, target: &RenderTarget) -> (i32, i32) {
        (target.w, target.h)
    }

    fn clear_default_target(&mut self, width: i32, height: i32, color: [f32; 4]) {
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, width.max(1), height.max(1));
            gl.clear_color(color[0], color[1], color[2], color[3]);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn run_pass(&mut self, pass: PassOp<'_, Self>) -> Result<(), RenderError> {
        unsafe {
            let gl = &self.gl;

            match &pass.output {
                PassTarget::Offscreen(target) => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target.fbo));
                    gl.viewport(0, 0, target.w, target.h);
                }
                PassTarget::Default => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                    gl.viewport(0, 0, pass.viewport.0.max(1), pass.viewport.1.max(1));
                }
            }

            gl.disable(glow::DEPTH_TEST);
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);

            gl.use_program(Some(pass.program.handle));

            for (_name, location, value) in &pass.uniforms {
                match value {
                    UniformValue::Int(v) => gl.uniform_1_i32(Some(location), *v),
                    UniformValue::Float(v) => gl.uniform_1_f32(Some(location), *v),
                    UniformValue::Vec2(v) => gl.uniform_2_f32(Some(location), v[0], v[1]),
                    UniformValue::Vec3(v) => gl.uniform_3_f32(Some(location), v[0], v[1], v[2]),
                    UniformValue::Vec4(v) => {
                        gl.uniform_4_f32(Some(location), v[0], v[1], v[2], v[3])
                    }
                }
            }

            // Input textures bind to units in declared port order; the
            // sampler uniform shares the port's name.
            for (unit, (name, target)) in pass.inputs.iter().enumerate() {
                gl.active_texture(glow::TEXTURE0 + unit as u32);
                gl.bind_texture(glow::TEXTURE_2D, Some(target.tex));
                match pass.program.uniforms.get(name) {
                    Some(info) => gl.uniform_1_i32(Some(&info.location), unit as i32),
                    None => log::debug!("sampler '{name}' not active in program"),
                }
            }

            self.fs_tri.draw(gl);

            gl.use_program(None);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }

        Ok(())
    }
}
