// Example client demonstrating the job lifecycle against a running server.
//
// The model is a small production planning problem:
//   Maximize 3*x1 + 2*x2
//   Subject to:
//     2*x1 + x2 <= 100   (machine A hours)
//     x1 + 3*x2 <= 90    (machine B hours)
//     x1, x2 >= 0
//
// The optimum is 158 at x1 = 42, x2 = 16.

use tonic::metadata::MetadataValue;
use tonic::Request;

pub mod optiq {
    tonic::include_proto!("optiq");
}

use optiq::job_service_client::JobServiceClient;
use optiq::{
    constraint, job_metadata, model, objective, variable, Constraint, JobRequest, JobStatus,
    Model, Objective, SolutionStatus, SubmitJobRequest, Variable,
};

fn authed<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("user-id", MetadataValue::from_static("demo-user"));
    request
}

fn status_name(value: i32) -> &'static str {
    JobStatus::try_from(value)
        .map(|status| status.as_str_name())
        .unwrap_or("UNKNOWN")
}

fn is_terminal(value: i32) -> bool {
    matches!(
        JobStatus::try_from(value),
        Ok(JobStatus::Completed) | Ok(JobStatus::Failed) | Ok(JobStatus::Cancelled)
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = JobServiceClient::connect("http://127.0.0.1:50051").await?;

    println!("=== Production Planning Problem ===\n");

    let production = Model {
        name: "production-planning".to_string(),
        r#type: model::ProblemType::LinearProgramming as i32,
        variables: vec![
            Variable {
                name: "x1".to_string(),
                r#type: variable::VariableType::Continuous as i32,
                lower_bound: Some(0.0),
                upper_bound: None,
                initial_value: None,
            },
            Variable {
                name: "x2".to_string(),
                r#type: variable::VariableType::Continuous as i32,
                lower_bound: Some(0.0),
                upper_bound: None,
                initial_value: None,
            },
        ],
        constraints: vec![
            Constraint {
                name: "machine_a".to_string(),
                expression: "2*x1 + x2".to_string(),
                sense: constraint::Sense::Le as i32,
                rhs: 100.0,
            },
            Constraint {
                name: "machine_b".to_string(),
                expression: "x1 + 3*x2".to_string(),
                sense: constraint::Sense::Le as i32,
                rhs: 90.0,
            },
        ],
        objective: Some(Objective {
            name: "profit".to_string(),
            expression: "3*x1 + 2*x2".to_string(),
            sense: objective::Sense::Maximize as i32,
        }),
        config: None,
    };

    println!("Submitting job...");
    let job = client
        .submit_job(authed(SubmitJobRequest {
            model: Some(production),
            organization_id: None,
            tags: vec!["demo".to_string()],
            priority: Some(job_metadata::Priority::High as i32),
        }))
        .await?
        .into_inner();
    println!("Job {} is {}", job.id, status_name(job.status));

    // Follow the job until it reaches a terminal state.
    let mut watch = client
        .watch_job(authed(JobRequest { id: job.id.clone() }))
        .await?
        .into_inner();
    while let Some(snapshot) = watch.message().await? {
        println!("  -> {}", status_name(snapshot.status));
        if is_terminal(snapshot.status) {
            break;
        }
    }

    let finished = client
        .get_job(authed(JobRequest { id: job.id.clone() }))
        .await?
        .into_inner();

    println!("\n=== Result ===\n");
    if !matches!(
        JobStatus::try_from(finished.status),
        Ok(JobStatus::Completed)
    ) {
        let error = finished
            .metadata
            .and_then(|m| m.error)
            .unwrap_or_else(|| "no details recorded".to_string());
        println!("Job ended as {}: {}", status_name(finished.status), error);
        return Ok(());
    }

    let solution = client
        .get_solution(authed(JobRequest { id: job.id }))
        .await?
        .into_inner();

    match SolutionStatus::try_from(solution.status) {
        Ok(SolutionStatus::Optimal) | Ok(SolutionStatus::Feasible) => {
            println!(
                "Objective: {:.2}",
                solution.objective_value.unwrap_or_default()
            );
            let mut names: Vec<_> = solution.variables.keys().collect();
            names.sort();
            for name in names {
                println!("  {name} = {:.2}", solution.variables[name]);
            }
            println!("\nSolve time: {:.3}s", solution.solve_time);
            if solution.degraded {
                println!("(degraded result; no real solver backend was available)");
            }
        }
        Ok(SolutionStatus::Infeasible) => println!("Problem is infeasible"),
        Ok(SolutionStatus::Unbounded) => println!("Problem is unbounded"),
        _ => println!(
            "Solver finished without values: {}",
            solution.message.unwrap_or_default()
        ),
    }

    Ok(())
}
