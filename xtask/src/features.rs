use std::process::Command;

use anyhow::{Context, Result};

/// Crate and feature list pairs that must compile on their own
const FEATURE_COMBINATIONS: &[(&str, &[&str])] = &[
    ("mealwise-common", &[]), // default
    ("mealwise-common", &["foundation"]),
    ("mealwise-common", &["observability"]),
    ("mealwise-common", &["runtime"]),
    ("mealwise-domain", &[]),
    ("mealwise-domain", &["ts-gen"]),
    ("mealwise-infra", &[]),
    ("mealwise-infra", &["ts-gen"]),
];

/// Check that all required feature combinations compile successfully.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, (package, features)) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        let is_default = features.is_empty();
        let display_label =
            if is_default { format!("{package} (default)") } else { format!("{package} {joined}") };
        let feature_arg = if is_default { None } else { Some(joined) };

        println!(
            "\n[{}/{}] cargo check -p {package}{}",
            index + 1,
            FEATURE_COMBINATIONS.len(),
            feature_arg.as_ref().map(|arg| format!(" --features {arg}")).unwrap_or_default()
        );

        let mut command = Command::new("cargo");
        command.arg("check").arg("-p").arg(package);

        if let Some(feature_list) = feature_arg.as_ref() {
            command.arg("--features").arg(feature_list.as_str());
        }

        let status = command
            .status()
            .with_context(|| format!("Failed to run cargo check for '{display_label}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{display_label}' failed to compile");
        }

        println!("✅ '{display_label}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}
