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
        Some(spinner("removing functions..."))
    };
    let report = deployer.remove(&manifest, selection).map_err(|e| {
        if let Some(ref pb) = pb {
            spin_fail(pb, "remove failed");
        }
        describe(&e)
    })?;

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        if let Some(ref pb) = pb {
            if report.succeeded() {
                spin_ok(pb, "remove complete");
            } else {
                spin_fail(pb, "remove finished with errors");
            }
        }
        print_report(&report);
    }
    Ok(report_exit_code(&report))
}
