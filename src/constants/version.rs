use semver::Version;

pub fn get_version() -> String {
    let semver = env!("CARGO_PKG_VERSION").parse::<Version>();

    if let Ok(semver) = semver {
        let sha = env!("VERGEN_GIT_SHA");

        // vergen writes a placeholder instead of a sha when git is unavailable
        if sha == "VERGEN_IDEMPOTENT_OUTPUT" {
            semver.to_string()
        } else {
            format!("{} ({})", semver, sha.get(..7).unwrap_or(sha))
        }
    } else {
        tracing::warn!("couldn't parse a semver out of Cargo.toml? defaulting to 0.0.0-unknown.");
        String::from("0.0.0-unknown")
    }
}
