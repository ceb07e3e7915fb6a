//! Uniform values staged into render blocks.

/// A value bound to a program uniform before a draw.
///
/// The variants cover the scalar/vector types the shader format actually
/// uses. Samplers are not expressible here: texture inputs travel through
/// block ports, not staged values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// The GLSL spelling of this value's type, for directory checks and
    /// diagnostics.
    pub fn glsl_type(&self) -> &'static str {
        match self {
            UniformValue::Int(_) => "int",
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
        }
    }
}
