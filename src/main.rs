// main.rs
// Description: Binary entry point with menu loop. Trains a small MLP (XOR demo or a JSON
//              dataset), supports checkpoint save and load, and exposes the quartile and point
//              clustering helpers.
//
//              Usage: stroke_mlp [dataset.json] [config.json]
//
// History:
// - 2026-10-07: Add menu loop for training, prediction and checkpoints.
// - 2026-10-08: Add quartile and clustering commands.

use std::io::Write;

use ndarray::array;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stroke_mlp::geometry::Point;
use stroke_mlp::{
    graph, stats, Activation, Dataset, DenseSpec, MlpError, OptimizerConfig, Sequential, TrainingConfig,
};

const DEFAULT_CHECKPOINT_PATH: &str = "checkpoints/stroke_mlp.json";

fn read_line_trimmed() -> Result<String, MlpError> {
    let mut s_input = String::new();
    std::io::stdin().read_line(&mut s_input)?;
    Ok(s_input.trim().to_string())
}

fn prompt(s_text: &str) -> Result<String, MlpError> {
    print!("{}", s_text);
    std::io::stdout().flush()?;
    read_line_trimmed()
}

fn xor_dataset() -> Result<Dataset, MlpError> {
    Dataset::new(
        array![[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
        array![[0.0_f32], [1.0], [1.0], [0.0]],
    )
}

fn xor_config() -> TrainingConfig {
    TrainingConfig {
        i_epochs: 2000,
        i_batch_size: 4,
        d_learning_rate: 0.5,
        optimizer: OptimizerConfig::Sgd { momentum: 0.9 },
        ..TrainingConfig::default()
    }
}

// Build a fresh model whose dimensions match the dataset.
fn build_model(dataset: &Dataset, config: &TrainingConfig) -> Result<Sequential, MlpError> {
    let i_hidden = (dataset.input_dim() * 2).max(4);
    let output_activation = if dataset.target_dim() > 1 {
        Activation::Softmax
    } else {
        Activation::Sigmoid
    };

    let mut model = Sequential::with_seed(config.u64_seed);
    model.add(DenseSpec::new(i_hidden).with_input_dim(dataset.input_dim()))?;
    model.add(Activation::Tanh)?;
    model.add(DenseSpec::new(dataset.target_dim()))?;
    model.add(output_activation)?;
    model.compile_from_config(config)?;
    Ok(model)
}

// Checkpoints saved before compile carry no loss; fall back to the run's config.
fn ready_for_training(mut model: Sequential, config: &TrainingConfig) -> Result<Sequential, MlpError> {
    if !model.is_compiled() {
        model.compile_from_config(config)?;
    }
    Ok(model)
}

fn parse_numbers(s_line: &str) -> Result<Vec<f64>, MlpError> {
    s_line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| MlpError::invalid_parameter(format!("not_a_number_{}", s)))
        })
        .collect()
}

fn parse_points(s_line: &str) -> Result<Vec<Point>, MlpError> {
    let v_numbers = parse_numbers(s_line)?;
    if v_numbers.len() % 2 != 0 {
        return Err(MlpError::invalid_parameter("odd_number_of_coordinates"));
    }
    Ok(v_numbers.chunks(2).map(|c| Point::new(c[0], c[1])).collect())
}

fn print_predictions(model: &mut Sequential, dataset: &Dataset) -> Result<(), MlpError> {
    let a_pred = model.predict(&dataset.inputs)?;
    for (a_in, a_out) in dataset.inputs.rows().into_iter().zip(a_pred.rows()) {
        println!("{:?} -> {:?}", a_in.to_vec(), a_out.to_vec());
    }
    if model.loss().is_some() {
        println!("loss = {:.6}", model.evaluate(&dataset.inputs, &dataset.targets)?);
    }
    Ok(())
}

fn run() -> Result<(), MlpError> {
    let v_args: Vec<String> = std::env::args().skip(1).collect();

    let (dataset, config) = match v_args.first() {
        Some(s_data) => {
            let dataset = Dataset::from_json_file(s_data)?;
            let config = match v_args.get(1) {
                Some(s_config) => TrainingConfig::from_json_file(s_config)?,
                None => TrainingConfig::default(),
            };
            (dataset, config)
        }
        None => (xor_dataset()?, xor_config()),
    };

    let mut model = build_model(&dataset, &config)?;
    let mut s_checkpoint_path = DEFAULT_CHECKPOINT_PATH.to_string();

    println!("\n=== MODEL INFORMATION ===");
    for s_line in model.summary() {
        println!("{}", s_line);
    }
    println!("Total parameters: {}", model.total_parameters());
    println!("Training rows: {}", dataset.len());

    loop {
        println!("\n--- Menu Mode ---");
        println!("Commands:");
        println!("  t Train");
        println!("  p Predict training inputs");
        println!("  s Save checkpoint");
        println!("  l Load checkpoint");
        println!("  q Quartiles of numbers");
        println!("  c Cluster points");
        println!("  e Exit");

        let s_cmd = match prompt("\nEnter command: ") {
            Ok(s) => s.to_lowercase(),
            Err(e) => {
                println!("Input error: {}", e);
                continue;
            }
        };

        match s_cmd.as_str() {
            "e" => {
                println!("Exit.");
                break;
            }
            "t" => match model.fit_dataset(&dataset, &config) {
                Ok(history) => {
                    if let Some(d_loss) = history.final_loss() {
                        println!("Final epoch loss: {:.6}", d_loss);
                    }
                }
                Err(e) => error!(%e, "training failed"),
            },
            "p" => {
                if let Err(e) = print_predictions(&mut model, &dataset) {
                    println!("Predict failed: {}", e);
                }
            }
            "s" => {
                let s_path = prompt("Enter checkpoint path or press Enter for default: ")?;
                if !s_path.is_empty() {
                    s_checkpoint_path = s_path;
                }
                match model.save_checkpoint(&s_checkpoint_path) {
                    Ok(()) => println!("Saved checkpoint: {}", s_checkpoint_path),
                    Err(e) => println!("Save failed: {}", e),
                }
            }
            "l" => {
                let s_path = prompt("Enter checkpoint path or press Enter for default: ")?;
                if !s_path.is_empty() {
                    s_checkpoint_path = s_path;
                }
                match Sequential::load_checkpoint_rebuild(&s_checkpoint_path)
                    .and_then(|loaded| ready_for_training(loaded, &config))
                {
                    Ok(loaded) => {
                        model = loaded;
                        println!("Loaded checkpoint: {}", s_checkpoint_path);
                    }
                    Err(e) => println!("Load failed: {}", e),
                }
            }
            "q" => {
                let s_line = prompt("Numbers (comma or space separated): ")?;
                match parse_numbers(&s_line).and_then(|v| stats::quartiles(&v)) {
                    Ok((q1, q2, q3)) => println!("q1={} q2={} q3={}", q1, q2, q3),
                    Err(e) => println!("Quartiles failed: {}", e),
                }
            }
            "c" => {
                let s_line = prompt("Points as x y pairs: ")?;
                let s_threshold = prompt("Distance threshold: ")?;
                let r_clusters = parse_points(&s_line).and_then(|v_points| {
                    let d_threshold = s_threshold
                        .parse::<f64>()
                        .map_err(|_| MlpError::invalid_parameter("threshold_not_a_number"))?;
                    graph::cluster_points(&v_points, d_threshold)
                });
                match r_clusters {
                    Ok(v_clusters) => {
                        for (i_idx, s_group) in v_clusters.iter().enumerate() {
                            println!("cluster[{}] {:?}", i_idx, s_group);
                        }
                    }
                    Err(e) => println!("Clustering failed: {}", e),
                }
            }
            _ => println!("Unknown command: {}", s_cmd),
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stroke_mlp=info")),
        )
        .init();

    info!("stroke_mlp started");
    if let Err(e) = run() {
        error!(%e, "stroke_mlp stopped");
        std::process::exit(1);
    }
}
