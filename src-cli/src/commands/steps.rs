use matchday::pipeline::{Artifact, StepChain, StepKind};

fn names(artifacts: &[Artifact]) -> String {
    if artifacts.is_empty() {
        return "-".to_string();
    }
    artifacts
        .iter()
        .map(|a| a.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run_steps() -> i32 {
    let chain = StepChain::standard();
    for step in chain.steps() {
        let kind = match step.kind {
            StepKind::Extract => "extract",
            StepKind::Transform(_) => "transform",
            StepKind::QualityGate => "gate",
            StepKind::Validation => "gate",
        };
        println!("{:<9} {:<10} {}", step.id, kind, step.label);
        println!("          after:  {}", step.depends_on.unwrap_or("-"));
        println!("          reads:  {}", names(step.reads));
        println!("          writes: {}", names(step.writes));
    }
    0
}
