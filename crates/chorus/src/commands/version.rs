pub fn run() -> anyhow::Result<()> {
    println!("chorus {}", env!("CARGO_PKG_VERSION"));
    println!("Checkpoint-resumable conversation clustering pipeline");
    Ok(())
}
