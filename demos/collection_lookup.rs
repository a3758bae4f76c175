use mlp_surrogate::{IoMap, NetworkCollection};
use tracing_subscriber::EnvFilter;

fn main() -> mlp_surrogate::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut fluid =
        NetworkCollection::from_files(&["tests/data/density.mlp", "tests/data/viscosity.mlp"])?;

    let inputs = ["p", "T"];
    let outputs = ["rho", "h", "mu"];
    let mut map = IoMap::new(&fluid, &inputs, &outputs)?;

    let mut y = [0.0; 3];
    let mut jac = [0.0; 6];
    for t in [400.0, 900.0, 1500.0] {
        fluid.predict(&mut map, &[2.0, t], &mut y, Some(&mut jac))?;
        println!("T={t:>6}: rho={:.4} h={:.3} mu={:.5}", y[0], y[1], y[2]);
        for (o, name) in outputs.iter().enumerate() {
            println!("  d{name}/dp={:.3e} d{name}/dT={:.3e}", jac[2 * o], jac[2 * o + 1]);
        }
    }
    Ok(())
}
