use crate::function::{Arguments, Function, Toolkit};
use crate::tools::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn find(kit: &Toolkit, name: &str) -> Function {
    kit.functions().iter().find(|f| f.name() == name).cloned().unwrap()
}

fn args(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        _ => panic!("arguments must be an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_dir_marks_directories() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("b.txt"), "b").unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();

        let result = list_dir(temp_dir.path()).unwrap();
        assert_eq!(result, vec!["a.txt", "b.txt", "sub/"]);
    }

    #[test]
    fn test_list_dir_nonexistent_directory() {
        let result = list_dir(Path::new("/nonexistent/directory/that/should/not/exist"));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_file.txt");
        fs::write(&file_path, "Line 1\nLine 2\nLine 3\nLine 4\nLine 5").unwrap();

        let result = read_file(&file_path, None, None).unwrap();
        assert_eq!(result, "1: Line 1\n2: Line 2\n3: Line 3\n4: Line 4\n5: Line 5");

        let result = read_file(&file_path, Some(2), Some(4)).unwrap();
        assert_eq!(result, "2: Line 2\n3: Line 3\n4: Line 4");

        let result = read_file(&file_path, None, Some(3)).unwrap();
        assert_eq!(result, "1: Line 1\n2: Line 2\n3: Line 3");

        let result = read_file(&file_path, Some(3), None).unwrap();
        assert_eq!(result, "3: Line 3\n4: Line 4\n5: Line 5");

        assert!(read_file(&file_path, Some(10), Some(12)).is_err());
        assert!(read_file(&file_path, Some(4), Some(2)).is_err());
    }

    #[test]
    fn test_read_file_nonexistent() {
        assert!(read_file(Path::new("/nonexistent/file.txt"), None, None).is_err());
    }

    #[test]
    fn test_write_file_creates_parents_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("deep").join("test_write.txt");

        write_file(&file_path, "first").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "first");

        let msg = write_file(&file_path, "Overwritten content").unwrap();
        assert!(msg.contains("19 bytes"));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "Overwritten content");
    }

    #[test]
    fn test_search_in_files_operations() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("file1.txt"), "Hello world\nTest pattern\nAnother line").unwrap();
        fs::write(temp_dir.path().join("file2.txt"), "Different content\nTest pattern here\nMore content").unwrap();
        fs::create_dir(temp_dir.path().join(".hidden")).unwrap();
        fs::write(temp_dir.path().join(".hidden").join("x.txt"), "Test pattern").unwrap();

        let result = search_in_files("Test pattern", temp_dir.path(), temp_dir.path(), Some(true)).unwrap();
        assert!(result.starts_with("Found 2 matches in 2 files"));
        assert!(result.contains("file1.txt:2:Test pattern"));
        assert!(result.contains("file2.txt:2:Test pattern here"));
        assert!(!result.contains(".hidden"));
    }

    #[test]
    fn test_search_in_files_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.txt"), "Hello WORLD\nworld here\nAnother line").unwrap();

        let result = search_in_files("world", temp_dir.path(), temp_dir.path(), Some(false)).unwrap();
        assert!(result.contains("WORLD"));
        assert!(result.contains("world here"));

        let result = search_in_files("world", temp_dir.path(), temp_dir.path(), None).unwrap();
        assert!(result.starts_with("Found 1 matches"));

        assert!(search_in_files("absent", temp_dir.path(), temp_dir.path(), None).is_err());
        assert!(search_in_files("(", temp_dir.path(), temp_dir.path(), None).is_err());
    }

    #[test]
    fn test_run_shell_safe_commands() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("marker.txt"), "").unwrap();

        let output = run_shell("echo 'Hello World'", temp_dir.path(), Duration::from_secs(5)).unwrap();
        assert!(output.contains("Hello World"));

        // Commands run inside the work directory.
        let output = run_shell("ls", temp_dir.path(), Duration::from_secs(5)).unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[test]
    fn test_run_shell_dangerous_commands() {
        let temp_dir = TempDir::new().unwrap();
        for cmd in ["rm -rf /", "sudo rm", "dd if=/dev/zero", "mkfs", "echo ok; rm x", ""] {
            assert!(run_shell(cmd, temp_dir.path(), Duration::from_secs(5)).is_err(), "{}", cmd);
        }
    }

    #[test]
    fn test_run_shell_failure_and_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let err = run_shell("echo oops >&2; exit 3", temp_dir.path(), Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("oops"));

        let err = run_shell("sleep 5", temp_dir.path(), Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_run_shell_output_larger_than_pipe_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let output = run_shell(
            r"head -c 200000 /dev/zero | tr '\0' 'a'",
            temp_dir.path(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(output.len(), 200_000);
        assert!(output.bytes().all(|b| b == b'a'));

        let err = run_shell("head -c 100000 /dev/zero >&2; exit 1", temp_dir.path(), Duration::from_secs(10))
            .unwrap_err();
        assert!(err.to_string().starts_with("exit status 1"));
    }

    #[test]
    fn test_resolve_in_confines_paths() {
        let base = Path::new("/work");
        assert_eq!(resolve_in(base, "a/b.txt").unwrap(), Path::new("/work/a/b.txt"));
        assert_eq!(resolve_in(base, "./a/../c").unwrap(), Path::new("/work/c"));
        assert_eq!(resolve_in(base, "/work/x").unwrap(), Path::new("/work/x"));
        assert!(resolve_in(base, "../etc/passwd").is_err());
        assert!(resolve_in(base, "a/../../b").is_err());
        assert!(resolve_in(base, "/etc/passwd").is_err());
    }

    #[test]
    fn test_file_toolkit_functions() {
        let temp_dir = TempDir::new().unwrap();
        let kit = file_tools(temp_dir.path());
        let names: Vec<&str> = kit.functions().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["list_dir", "read_file", "write_file", "search_in_files"]);

        let write = find(&kit, "write_file");
        write
            .call(&args(json!({"path": "notes/todo.txt", "content": "buy milk"})))
            .unwrap();
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("notes").join("todo.txt")).unwrap(),
            "buy milk"
        );

        let read = find(&kit, "read_file");
        assert_eq!(read.call(&args(json!({"path": "notes/todo.txt"}))).unwrap(), "1: buy milk");

        let list = find(&kit, "list_dir");
        assert_eq!(list.call(&args(json!({}))).unwrap(), "notes/");

        let escape = read.call(&args(json!({"path": "../outside.txt"}))).unwrap_err();
        assert!(escape.contains("outside the work directory"));

        let search = find(&kit, "search_in_files");
        let hits = search.call(&args(json!({"pattern": "milk"}))).unwrap();
        assert!(hits.contains("notes/todo.txt:1:buy milk"));
    }

    #[test]
    fn test_shell_toolkit_runs_in_work_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("here.txt"), "").unwrap();
        let run = find(&shell_tools(temp_dir.path()), "run_shell");
        assert!(run.call(&args(json!({"command": "ls"}))).unwrap().contains("here.txt"));
        assert!(run.call(&args(json!({"command": "sudo ls"}))).is_err());
    }

    #[test]
    fn test_calculator_toolkit() {
        let kit = calculator();
        let call = |name: &str, value: Value| find(&kit, name).call(&args(value));

        assert_eq!(call("add", json!({"first_int": 2, "second_int": 3})).unwrap(), "5");
        assert_eq!(call("subtract", json!({"first_int": 2, "second_int": 3})).unwrap(), "-1");
        assert_eq!(call("multiply", json!({"first_int": 6, "second_int": 7})).unwrap(), "42");
        assert!(call("add", json!({"first_int": i64::MAX, "second_int": 1})).unwrap_err().contains("overflows"));
        assert!(call("add", json!({"a": 2, "b": 3})).is_err());
        assert_eq!(call("divide", json!({"first_int": 7, "second_int": 2})).unwrap(), "3.5");
        assert!(call("divide", json!({"first_int": 1, "second_int": 0})).unwrap_err().contains("Division by zero"));
        assert_eq!(call("exponentiate", json!({"base": 2, "exponent": 10})).unwrap(), "1024");
        assert_eq!(call("exponentiate", json!({"base": 4, "exponent": 0.5})).unwrap(), "2");
        assert_eq!(call("factorial", json!({"n": 5})).unwrap(), "120");
        assert!(call("factorial", json!({"n": -1})).is_err());
        assert_eq!(call("is_prime", json!({"n": 97})).unwrap(), "true");
        assert_eq!(call("is_prime", json!({"n": 1})).unwrap(), "false");
    }
}
