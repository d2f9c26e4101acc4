use std::process::Command;

/// Create a new f4 CLI command
pub fn f4() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_f4"));
    command.env_remove("FOR4_SOCKET_URL").env("NO_COLOR", "1");
    command
}
