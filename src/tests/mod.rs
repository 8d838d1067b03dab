mod registry_tests;
mod run_tests;
mod tool_tests;
