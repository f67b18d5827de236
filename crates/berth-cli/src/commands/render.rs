//! `berth render`: print the planned deployment and service, contact nothing.

use berth_core::BerthConfig;

use super::WorkloadArgs;
use crate::report::exit_code;

pub fn run(
    repository_uri: &str,
    workload: &WorkloadArgs,
    config: &BerthConfig,
) -> anyhow::Result<u8> {
    match workload.request(repository_uri, config).plan() {
        Ok(plan) => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(0)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(exit_code(err.kind()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(replicas: i32) -> WorkloadArgs {
        WorkloadArgs {
            tag: "v1".to_string(),
            namespace: Some("staging".to_string()),
            deployment: "my-app-dep".to_string(),
            service: "my-app-svc".to_string(),
            container_name: None,
            replicas,
            container_port: 5000,
            service_port: Some(80),
        }
    }

    #[test]
    fn valid_inputs_render() {
        let cfg = BerthConfig::default();
        let code = run("registry.example/my-app", &workload(2), &cfg).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn negative_replicas_exit_with_validation_code() {
        let cfg = BerthConfig::default();
        let code = run("registry.example/my-app", &workload(-1), &cfg).unwrap();
        assert_eq!(code, 2);
    }
}
