use super::{
    describe, json_pretty, load, make_deployer, print_summary, EngineFlags, Target, EXIT_SUCCESS,
};
use fgdeploy_core::Selection;

pub fn run(target: &Target<'_>, selection: &Selection, json: bool) -> Result<u8, String> {
    let (manifest, config) = load(target)?;
    let deployer = make_deployer(config, target.manifest, EngineFlags::default());
    let info = deployer
        .info(&manifest, selection)
        .map_err(|e| describe(&e))?;

    if json {
        println!("{}", json_pretty(&info)?);
        return Ok(EXIT_SUCCESS);
    }
    println!("Service Information");
    if let Some(service) = &info.service {
        println!("service: {service}");
    }
    println!("region:  {}", info.region);
    println!("Functions");
    if info.functions.iter().all(|f| f.deployed.is_none()) {
        println!("  There are no functions deployed yet.");
        return Ok(EXIT_SUCCESS);
    }
    for function in &info.functions {
        match &function.deployed {
            Some(summary) => {
                println!("  {}", function.name);
                print_summary(summary);
            }
            None => println!("  {} (not deployed)", function.name),
        }
    }
    Ok(EXIT_SUCCESS)
}
