fn main() -> anyhow::Result<()> {
    let args = std::env::args().skip(1).collect();
    pinglet_lib::run(args)?;
    Ok(())
}
