//! Draws the classic "triangle of triangles": a six-vertex mesh with a
//! warm color gradient, drawn as three indexed triangles and rescaled
//! by a push-constant uniform every frame.

use trigon::mesh::{Mesh, Vec3, Vertex};
use trigon::Renderer;

use log::LevelFilter;
use simple_logger::SimpleLogger;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};

static VERT_SRC: &str = include_str!("triangle.vert");
static FRAG_SRC: &str = include_str!("triangle.frag");

const CLEAR_COLOR: [f32; 4] = [0.07, 0.13, 0.17, 1.0];
const SCALE: f32 = 0.8;

fn triangle_mesh() -> Mesh {
    let s3 = 3.0f32.sqrt();

    let vertices = vec![
        // outer corners
        Vertex::new(
            Vec3::new(-0.5, -0.5 * s3 / 3.0, 0.0),
            Vec3::new(0.8, 0.3, 0.02),
        ),
        Vertex::new(
            Vec3::new(0.5, -0.5 * s3 / 3.0, 0.0),
            Vec3::new(0.8, 0.3, 0.02),
        ),
        Vertex::new(
            Vec3::new(0.0, 0.5 * s3 * 2.0 / 3.0, 0.0),
            Vec3::new(1.0, 0.6, 0.32),
        ),
        // edge midpoints
        Vertex::new(
            Vec3::new(-0.25, 0.5 * s3 / 6.0, 0.0),
            Vec3::new(0.9, 0.45, 0.17),
        ),
        Vertex::new(
            Vec3::new(0.25, 0.5 * s3 / 6.0, 0.0),
            Vec3::new(0.9, 0.45, 0.17),
        ),
        Vertex::new(
            Vec3::new(0.0, -0.5 * s3 / 3.0, 0.0),
            Vec3::new(0.8, 0.3, 0.02),
        ),
    ];

    // lower left, upper, lower right
    let indices = vec![0, 3, 5, 3, 2, 4, 5, 4, 1];

    Mesh::new(vertices, indices).expect("triangle mesh data is well formed")
}

fn compile_shaders() -> (Vec<u32>, Vec<u32>) {
    let mut compiler = shaderc::Compiler::new().expect("no SPIR-V compiler available");

    let vert = compiler
        .compile_into_spirv(
            VERT_SRC,
            shaderc::ShaderKind::Vertex,
            "triangle.vert",
            "main",
            None,
        )
        .expect("vertex shader failed to compile");
    let frag = compiler
        .compile_into_spirv(
            FRAG_SRC,
            shaderc::ShaderKind::Fragment,
            "triangle.frag",
            "main",
            None,
        )
        .expect("fragment shader failed to compile");

    (vert.as_binary().to_vec(), frag.as_binary().to_vec())
}

fn main() {
    SimpleLogger::new()
        .with_module_level("gfx_backend_vulkan", LevelFilter::Warn)
        .init()
        .unwrap();

    let event_loop = EventLoop::new();

    let wb = winit::window::WindowBuilder::new()
        .with_inner_size(winit::dpi::Size::Physical(winit::dpi::PhysicalSize::new(
            800, 800,
        )))
        .with_resizable(false)
        .with_title("triangle".to_string());
    let window = wb.build(&event_loop).expect("failed to build window");

    let mut renderer = match Renderer::new(&window, "triangle") {
        Ok(renderer) => renderer,
        Err(e) => {
            eprintln!("Failed to set up the renderer: {}", e);
            std::process::exit(1);
        }
    };

    let (vert_spirv, frag_spirv) = compile_shaders();
    renderer
        .install_pipeline(&Vertex::layout(), &vert_spirv, &frag_spirv)
        .expect("failed to build the graphics pipeline");
    renderer
        .upload_mesh(&triangle_mesh())
        .expect("failed to upload the mesh");

    event_loop.run(move |e, _, control_flow| match e {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            *control_flow = ControlFlow::Exit;
        }
        Event::MainEventsCleared => {
            renderer
                .draw_frame(CLEAR_COLOR, SCALE)
                .expect("failed to draw frame");
        }
        _ => {}
    });
}
