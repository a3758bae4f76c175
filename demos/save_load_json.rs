fn main() -> mlp_surrogate::Result<()> {
    use mlp_surrogate::Network;

    let mut net = Network::from_mlp_file("tests/data/density.mlp")?;

    let path = "target/tmp_density.json";
    net.save_json(path)?;
    let mut loaded = Network::load_json(path)?;

    let x = [1000.0, 5.0];
    let a = net.predict(&x, true)?.to_vec();
    let b = loaded.predict(&x, true)?.to_vec();
    assert_eq!(a, b);
    println!("saved and loaded model: {path}, outputs {b:?}");
    Ok(())
}
