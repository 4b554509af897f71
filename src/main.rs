fn main() -> anyhow::Result<()> {
    println!("Shapefall");
    println!("Controls:");
    println!("  Click - Capture the mouse to look around");
    println!("  WASD / Arrows - Move camera");
    println!("  Escape - Release the mouse, press again to exit");
    println!();

    shapefall::run()
}
