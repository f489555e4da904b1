//! System-wide constants and default paths.

/// Fixed name of the stack synthesized by the CLI.
pub const STACK_NAME: &str = "sonar";

/// Default directory the cloud assembly is written to.
pub const DEFAULT_OUT_DIR: &str = "cdk.out";

/// File name of the cloud assembly manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Version of the assembly manifest layout.
pub const MANIFEST_VERSION: &str = "1.0.0";

/// Template format version stamped on every rendered template.
pub const TEMPLATE_FORMAT_VERSION: &str = "sonar-template/1";

/// Interpreter line prepended to host bootstrap user data.
pub const USER_DATA_SHEBANG: &str = "#!/bin/bash";

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Application name used in CLI output and template descriptions.
pub const APP_NAME: &str = "sonar-stack";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "sonar";
