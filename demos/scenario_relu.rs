use mlp_surrogate::{Activation, NetworkBuilder};

fn main() -> mlp_surrogate::Result<()> {
    // 1 -> 1 (ReLU) -> 1 (linear), y = relu(2 x).
    let mut net = NetworkBuilder::new()
        .define_input_layer(1)?
        .push_hidden_layer(1, Activation::ReLU)?
        .define_output_layer(1, Activation::Linear)?
        .size_weights()?;
    net.set_weight(0, 0, 0, 2.0)?;
    net.set_weight(1, 0, 0, 1.0)?;
    net.set_input_name(0, "x")?;
    net.set_output_name(0, "y")?;

    print!("{net}");

    for x in [-0.5, 0.0, 0.5, 1.0] {
        let y = net.predict(&[x], true)?[0];
        println!("x={x:>5} y={y:>5} dy/dx={}", net.jacobian()[0]);
    }
    Ok(())
}
