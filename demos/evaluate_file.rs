use std::path::PathBuf;

use mlp_surrogate::Network;
use tracing_subscriber::EnvFilter;

fn main() -> mlp_surrogate::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/data/density.mlp"));

    let mut net = Network::from_mlp_file(&path)?;
    print!("{net}");

    // Evaluate at the middle of every input range.
    let x: Vec<f64> = (0..net.input_dim())
        .filter_map(|i| net.input_norm(i))
        .map(|(min, max)| 0.5 * (min + max))
        .collect();
    let y = net.predict(&x, true)?.to_vec();

    for (o, name) in net.output_names().iter().enumerate() {
        println!("{name} = {}", y[o]);
        let Some(row) = net.jacobian_row(o) else {
            continue;
        };
        for (input, d) in net.input_names().iter().zip(row) {
            println!("  d{name}/d{input} = {d}");
        }
    }
    Ok(())
}
