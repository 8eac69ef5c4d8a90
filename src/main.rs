//! Shape Equation Compiler CLI
//!
//! Usage:
//!   shapec "nhwc->nchw" --shape 2x3x4x5
//!   shapec "(ab)->ab" --rank 1 --size b=4 --json
//!   shapec "ij->ijk" --shape 2x3 --size k=4 --apply

use clap::Parser as ClapParser;
use colored::Colorize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use shape_equation::ops::format_shape;
use shape_equation::{
    compile_with_config, CompileError, DenseBackend, DenseTensor, InputShape, Plan, PlannerConfig,
};

#[derive(ClapParser, Debug)]
#[command(name = "shapec")]
#[command(version = "0.1.0")]
#[command(about = "Compiles shape equations to transpose/reshape/tile plans")]
struct Args {
    /// Shape equation to compile (e.g., "(ab)c->bac")
    #[arg(value_name = "EQUATION")]
    equation: String,

    /// Input shape (e.g., "2x3x4")
    #[arg(short = 's', long = "shape", value_parser = parse_dims, conflicts_with = "rank")]
    shape: Option<Dims>,

    /// Input rank, when only the number of axes is known
    #[arg(short = 'r', long = "rank")]
    rank: Option<usize>,

    /// Size of a tiling index or group factor (e.g., "k=4")
    #[arg(short = 'k', long = "size", value_parser = parse_size)]
    sizes: Vec<(String, usize)>,

    /// Output as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Run the plan on a tensor holding 0, 1, 2, ... and print the result
    #[arg(short = 'a', long = "apply", requires = "shape")]
    apply: bool,

    /// Emit every synthesis step without simplification
    #[arg(long = "no-simplify")]
    no_simplify: bool,

    /// Planner configuration file (JSON)
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Axis sizes given as `2x3x4`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dims(Vec<usize>);

fn parse_dims(s: &str) -> Result<Dims, String> {
    if s.is_empty() {
        return Ok(Dims(Vec::new()));
    }
    s.split('x')
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| format!("Invalid dimension: {}", dim))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Dims)
}

fn parse_size(s: &str) -> Result<(String, usize), String> {
    let (name, size) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid size format: {}", s))?;
    let size = size
        .parse::<usize>()
        .map_err(|_| format!("Invalid size for '{}': {}", name, size))?;
    Ok((name.to_string(), size))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer).init();
}

fn fail(label: &str, message: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", label.red(), message);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => PlannerConfig::from_json_file(path).unwrap_or_else(|e| fail("Error", e)),
        None => PlannerConfig::default(),
    };
    if args.no_simplify {
        config.simplify = false;
    }

    let input = match (&args.shape, args.rank) {
        (Some(Dims(dims)), _) => InputShape::Dims(dims.clone()),
        (None, Some(rank)) => InputShape::Rank(rank),
        (None, None) => fail("Error", "either --shape or --rank is required"),
    };

    if args.verbose {
        println!("{}", "Shape Equation Compiler".bold().blue());
        println!("{}", "=".repeat(35));
        println!();
        println!("{}: {}", "Equation".green(), args.equation);
        println!("{}: {}", "Input".green(), describe_input(&input));
        println!(
            "{}: simplify={}, verify={}",
            "Planner".green(),
            config.simplify,
            config.verify
        );
        println!();
    }

    let sizes: Vec<(&str, usize)> = args
        .sizes
        .iter()
        .map(|(name, size)| (name.as_str(), *size))
        .collect();

    let plan = match compile_with_config(&args.equation, input, &sizes, &config) {
        Ok(plan) => plan,
        Err(e) => fail(error_label(&e), e),
    };

    if args.json_output {
        match plan.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fail("Error", format!("Failed to serialize to JSON: {}", e)),
        }
    } else {
        print_plan(&plan);
    }

    if let (true, Some(Dims(dims))) = (args.apply, args.shape) {
        let result = plan
            .execute(&DenseBackend, DenseTensor::iota(dims))
            .unwrap_or_else(|e| fail("Execution error", e));
        print_tensor(&result, args.verbose);
    }
}

fn error_label(error: &CompileError) -> &'static str {
    match error {
        CompileError::MalformedEquation { .. }
        | CompileError::InvalidCharacter { .. }
        | CompileError::DuplicateIndex { .. }
        | CompileError::MultipleEllipsis { .. }
        | CompileError::NestedGroup { .. }
        | CompileError::UnmatchedParen { .. }
        | CompileError::EmptyGroup { .. } => "Parse error",
        CompileError::UnbalancedIndex { .. } | CompileError::UnbalancedEllipsis { .. } => {
            "Index error"
        }
        CompileError::UnreachableShape { .. } => "Internal error",
        _ => "Shape error",
    }
}

fn describe_input(input: &InputShape) -> String {
    match input {
        InputShape::Rank(rank) => format!("rank {}", rank),
        InputShape::Dims(dims) => format!("{:?}", dims),
    }
}

fn print_plan(plan: &Plan) {
    println!("{}", "Compilation Results".bold().green());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}: {}", "Equation".cyan(), plan.equation);
    println!("{}: {}", "Input shape".cyan(), format_shape(&plan.input_shape));
    println!("{}: {}", "Output shape".cyan(), format_shape(&plan.output_shape));
    println!("{}: {}", "Total ops".cyan(), plan.len());
    println!();

    if plan.is_noop() {
        println!("(no-op: the input is returned unchanged)");
        return;
    }

    println!("{}", "Operations".bold().yellow());
    println!("{}", "-".repeat(50));
    for (i, (op, shape)) in plan.ops.iter().zip(plan.shapes().iter().skip(1)).enumerate() {
        println!("  {} {}  {} {}", i.to_string().bold(), op, "->".dimmed(), format_shape(shape));
    }
}

fn print_tensor(tensor: &DenseTensor<usize>, verbose: bool) {
    const PREVIEW: usize = 64;

    println!();
    println!("{}", "Applied to iota input".bold().yellow());
    println!("{}", "-".repeat(50));
    println!("  {}: {:?}", "Shape".cyan(), tensor.shape());
    let data = tensor.data();
    if verbose || data.len() <= PREVIEW {
        println!("  {}: {:?}", "Data (row-major)".cyan(), data);
    } else {
        println!(
            "  {}: {:?} ... ({} elements, use -v for all)",
            "Data (row-major)".cyan(),
            &data[..PREVIEW],
            data.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dims() {
        assert_eq!(parse_dims("2x3x4"), Ok(Dims(vec![2, 3, 4])));
        assert_eq!(parse_dims("7"), Ok(Dims(vec![7])));
        assert_eq!(parse_dims(""), Ok(Dims(vec![])));
        assert!(parse_dims("2xq").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("k=4"), Ok(("k".to_string(), 4)));
        assert!(parse_size("k4").is_err());
        assert!(parse_size("k=-1").is_err());
    }

    #[test]
    fn test_error_labels() {
        assert_eq!(error_label(&CompileError::EmptyGroup { position: 0 }), "Parse error");
        assert_eq!(error_label(&CompileError::MissingSize { index: 'k' }), "Shape error");
    }

    #[test]
    fn test_cli_arguments() {
        let args = Args::try_parse_from(["shapec", "ij->ijk", "-s", "2x3", "--size", "k=4", "--apply"])
            .unwrap();
        assert_eq!(args.shape, Some(Dims(vec![2, 3])));
        assert_eq!(args.sizes, vec![("k".to_string(), 4)]);
        assert!(args.apply);

        assert!(Args::try_parse_from(["shapec", "ij->ji", "--shape", "2x3", "--rank", "2"]).is_err());
        assert!(Args::try_parse_from(["shapec", "ij->ji", "--rank", "2", "--apply"]).is_err());
    }
}
