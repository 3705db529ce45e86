use super::{
    describe, json_pretty, load, make_deployer, print_report, report_exit_code, spin_fail,
    spin_ok, spinner, EngineFlags, Target,
};
use fgdeploy_core::Selection;

pub fn run(
    target: &Target<'_>,
    selection: &Selection,
    flags: EngineFlags,
    json: bool,
) -> Result<u8, String> {
    let (manifest, config) = load(target)?;
    let deployer = make_deployer(config, target.manifest, flags);

    let pb = if json {
        None
    } else {
        Some(spinner("deploying functions..."))
    };
    let report = match deployer.deploy(&manifest, selection) {
        Ok(report) => report,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "deploy failed");
            }
            return Err(describe(&e));
        }
    };
    let code = report_exit_code(&report);

    if json {
        let payload = serde_json::json!({
            "service": manifest.service,
            "region": manifest.region,
            "succeeded": report.succeeded(),
            "functions": report.functions,
            "skipped": report.skipped,
            "interrupted": report.interrupted,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        if let Some(ref pb) = pb {
            if report.succeeded() {
                spin_ok(pb, "deploy complete");
            } else {
                spin_fail(pb, "deploy finished with errors");
            }
        }
        println!("Service Information");
        if let Some(service) = &manifest.service {
            println!("service: {service}");
        }
        println!("region:  {}", manifest.region);
        println!("Functions");
        print_report(&report);
    }
    Ok(code)
}
