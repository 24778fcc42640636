// src/constants.rs

/// The project metadata file whose `[tool.hatch]` table holds the configuration.
pub const PYPROJECT_FILENAME: &str = "pyproject.toml";

/// The dedicated configuration file. Its content is merged over `pyproject.toml`.
pub const HATCH_CONFIG_FILENAME: &str = "hatch.toml";

/// The environment every other environment templates from unless told otherwise.
pub const DEFAULT_ENV_NAME: &str = "default";

/// The environment type assigned to root environments that do not declare one.
pub const DEFAULT_ENV_TYPE: &str = "virtual";

/// The fallback `matrix-name-format`.
pub const DEFAULT_MATRIX_NAME_FORMAT: &str = "{value}";

/// The environment collector that is always enabled.
pub const DEFAULT_COLLECTOR: &str = "default";

/// Fully qualified path of the environments table, used in error messages.
pub const ENVS_FIELD: &str = "tool.hatch.envs";

/// Fully qualified path of the project scripts table.
pub const SCRIPTS_FIELD: &str = "tool.hatch.scripts";

/// Fully qualified path of the environment settings table.
pub const ENV_FIELD: &str = "tool.hatch.env";
