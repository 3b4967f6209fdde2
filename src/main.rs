fn main() -> std::process::ExitCode {
  invokeai_bridge_lib::run()
}
