//! The orchestration pipeline: wrapper selection, fingerprinting, cache
//! lookup, and the transparent fallback.
//!
//! The governing policy: the shim never fails an invocation that the
//! real tool would have completed. Any error before the tool has run
//! degrades to transparent execution; any error after the tool has run
//! (a failed insert, a failed stats write) is logged and swallowed.

use std::error::Error;
use std::path::Path;

use opal_args::ArgList;
use opal_cache::{CachedEntry, LocalStore, Stats};
use opal_common::{ContentHash, Fingerprint, FingerprintHasher};
use opal_config::Settings;
use opal_wrapper::{BuildFiles, Capability, ExePath, GccWrapper, ProgramWrapper};
use tracing::{debug, info, warn};

/// Version tag mixed into the first fingerprint segment. Bump whenever
/// the segment layout or any segment's semantics change.
const FORMAT_TAG: &[u8] = b"opal-fingerprint-v1";

/// Runs one shim invocation and returns the exit code to report.
///
/// `command[0]` names the tool; the rest are its arguments.
pub fn invoke(settings: &Settings, command: &[String]) -> i32 {
    let Some((tool, tool_args)) = command.split_first() else {
        return 1;
    };

    let shim_dir = shim_dir();
    let exe = match opal_util::find_executable(tool, &shim_dir) {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("opal: {e}");
            // 127 mirrors the shell's command-not-found convention.
            return 127;
        }
    };

    if settings.disabled {
        return run_transparent(&exe, tool_args);
    }

    match run_cached(settings, &exe, tool_args, &shim_dir) {
        Ok(code) => code,
        Err(e) => {
            debug!(error = %e, "cache bypassed, executing transparently");
            run_transparent(&exe, tool_args)
        }
    }
}

/// Resolves and runs a command transparently, without settings. Used
/// when configuration itself is broken.
pub fn run_transparent_by_name(command: &[String]) -> i32 {
    let Some((tool, tool_args)) = command.split_first() else {
        return 1;
    };
    match opal_util::find_executable(tool, &shim_dir()) {
        Ok(exe) => run_transparent(&exe, tool_args),
        Err(e) => {
            eprintln!("opal: {e}");
            127
        }
    }
}

/// Runs the real tool with unchanged arguments, forwarding its streams
/// and exit code. No cache interaction.
fn run_transparent(exe: &str, args: &[String]) -> i32 {
    let mut cmd = Vec::with_capacity(args.len() + 1);
    cmd.push(exe.to_string());
    cmd.extend_from_slice(args);
    match opal_sys::run(&cmd, false, "") {
        Ok(result) => result.return_code,
        Err(e) => {
            eprintln!("opal: {e}");
            1
        }
    }
}

/// The cacheable path: claim, resolve, fingerprint, lookup, and on a
/// miss run the tool and populate the store.
fn run_cached(
    settings: &Settings,
    exe: &str,
    args: &[String],
    shim_dir: &str,
) -> Result<i32, Box<dyn Error>> {
    let temp_dir = opal_sys::get_local_temp_folder(&settings.cache_dir)?;
    let exe_path = ExePath::new(exe, shim_dir);
    let mut wrapper = select_wrapper(exe_path, ArgList::from(args), settings, temp_dir)
        .ok_or("no wrapper claims this command")?;

    wrapper.resolve_args()?;
    let build_files = wrapper.get_build_files()?;

    let mut capabilities = wrapper.get_capabilities();
    capabilities.sort();
    let direct = settings.direct_mode && capabilities.contains(&Capability::DirectMode);

    let fingerprint = compute_fingerprint(wrapper.as_mut(), &capabilities, direct)?;
    debug!(fingerprint = %fingerprint, direct, "computed invocation fingerprint");

    let cache_dir = Path::new(&settings.cache_dir);
    let store = LocalStore::new(cache_dir, settings.max_size);
    let mut stats = Stats::load(cache_dir);

    if let Some(entry) = store.lookup(&fingerprint) {
        let allow_links = settings.hard_links && capabilities.contains(&Capability::HardLinks);
        materialize(&entry, &build_files, allow_links)?;
        opal_sys::print_raw_stdout(&entry.meta.stdout)?;
        opal_sys::print_raw_stderr(&entry.meta.stderr)?;
        info!(fingerprint = %fingerprint, "cache hit");
        stats.record_hit();
        save_stats(&stats, cache_dir);
        return Ok(entry.meta.return_code);
    }

    // Miss: run the real tool. From here on nothing may fail the
    // invocation — the tool's own result is what the caller gets.
    let mut cmd = Vec::with_capacity(args.len() + 1);
    cmd.push(exe.to_string());
    cmd.extend_from_slice(args);
    let result = opal_sys::run(&cmd, false, "")?;

    if result.success() {
        match collect_payloads(&build_files) {
            Some(payloads) => match store.insert(
                &fingerprint,
                result.return_code,
                &result.stdout,
                &result.stderr,
                &payloads,
            ) {
                Ok(evicted) => {
                    info!(fingerprint = %fingerprint, "cache miss, entry stored");
                    stats.record_evictions(evicted as u64);
                }
                Err(e) => warn!(error = %e, "failed to store cache entry"),
            },
            None => debug!("declared output missing, not storing entry"),
        }
    }

    stats.record_miss();
    save_stats(&stats, cache_dir);
    Ok(result.return_code)
}

/// Dispatches to the first wrapper that claims the command. The
/// candidate order is fixed; new tool families slot in here.
fn select_wrapper(
    exe_path: ExePath,
    args: ArgList,
    settings: &Settings,
    temp_dir: String,
) -> Option<Box<dyn ProgramWrapper>> {
    let candidates: Vec<Box<dyn ProgramWrapper>> = vec![Box::new(GccWrapper::new(
        exe_path,
        args,
        settings.direct_mode,
        temp_dir,
    ))];
    candidates.into_iter().find(|w| w.can_handle_command())
}

/// Folds the invocation's identity into a fingerprint, in fixed segment
/// order: format tag, program id, compatible mode, capability tags,
/// relevant arguments, relevant environment, explicit inputs, implicit
/// inputs, and (in preprocess mode) the preprocessed source.
fn compute_fingerprint(
    wrapper: &mut dyn ProgramWrapper,
    capabilities: &[Capability],
    direct: bool,
) -> Result<Fingerprint, Box<dyn Error>> {
    let mut hasher = FingerprintHasher::new();
    hasher.feed("format", FORMAT_TAG);
    hasher.feed("program", wrapper.get_program_id()?.as_bytes());
    hasher.feed("mode", wrapper.compatible_mode_tag().as_bytes());
    for capability in capabilities {
        hasher.feed("capability", capability.tag().as_bytes());
    }
    for arg in &wrapper.get_relevant_arguments() {
        hasher.feed("arg", arg.as_bytes());
    }
    for (name, value) in wrapper.get_relevant_env_vars() {
        hasher.feed("env", format!("{name}={value}").as_bytes());
    }
    for input in wrapper.get_input_files() {
        let hash = ContentHash::from_file(Path::new(&input))?;
        hasher.feed("input", hash.as_bytes());
    }

    let preprocessed = if direct { None } else { Some(wrapper.preprocess_source()?) };
    for implicit in wrapper.get_implicit_input_files() {
        let hash = ContentHash::from_file(Path::new(&implicit))?;
        hasher.feed("implicit", hash.as_bytes());
    }
    if let Some(source) = preprocessed {
        hasher.feed("preprocessed", ContentHash::from_bytes(&source).as_bytes());
    }

    Ok(hasher.finish())
}

/// Places every cached payload at its declared build-file path.
fn materialize(
    entry: &CachedEntry,
    build_files: &BuildFiles,
    allow_links: bool,
) -> Result<(), Box<dyn Error>> {
    for (role, dst) in build_files {
        let src = entry
            .payload_path(role)
            .ok_or_else(|| format!("cache entry lacks payload '{role}'"))?;
        let parent = opal_util::get_dir_part(dst);
        if !parent.is_empty() {
            opal_util::create_dir(&parent)?;
        }
        opal_util::link_or_copy(&src.to_string_lossy(), dst, allow_links)?;
    }
    Ok(())
}

/// Pairs every declared build file with its produced path, or `None` if
/// the tool did not produce one of them.
fn collect_payloads(build_files: &BuildFiles) -> Option<Vec<(String, String)>> {
    let mut payloads = Vec::with_capacity(build_files.len());
    for (role, path) in build_files {
        if !opal_util::file_exists(path) {
            return None;
        }
        payloads.push((role.clone(), path.clone()));
    }
    Some(payloads)
}

fn save_stats(stats: &Stats, cache_dir: &Path) {
    if let Err(e) = stats.save(cache_dir) {
        debug!(error = %e, "failed to persist statistics");
    }
}

fn shim_dir() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_string_lossy().to_string()))
        .map(|dir| opal_util::canonicalize_path(&dir))
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// A scratch project: a fake GCC-compatible compiler script, a
    /// source file that includes a header, and a cache directory.
    struct Project {
        _dir: tempfile::TempDir,
        settings: Settings,
        gcc: PathBuf,
        src: PathBuf,
        hdr: PathBuf,
        obj: PathBuf,
    }

    impl Project {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let hdr = dir.path().join("util.h");
            std::fs::write(&hdr, "#define ANSWER 42\n").unwrap();
            let src = dir.path().join("main.c");
            std::fs::write(&src, "int main(void) { return 0; }\n").unwrap();

            let gcc = dir.path().join("gcc");
            write_fake_gcc(&gcc, &hdr);

            let settings = Settings {
                cache_dir: dir.path().join("cache").to_string_lossy().to_string(),
                max_size: u64::MAX,
                disabled: false,
                direct_mode: false,
                hard_links: false,
                log_file: None,
                debug_level: "info".to_string(),
            };

            Self {
                obj: dir.path().join("main.o"),
                _dir: dir,
                settings,
                gcc,
                src,
                hdr,
            }
        }

        fn compile_command(&self, extra: &[&str]) -> Vec<String> {
            let mut cmd = vec![
                self.gcc.to_string_lossy().to_string(),
                "-c".to_string(),
                self.src.to_string_lossy().to_string(),
                "-o".to_string(),
                self.obj.to_string_lossy().to_string(),
            ];
            cmd.extend(extra.iter().map(|s| s.to_string()));
            cmd
        }

        fn stats(&self) -> Stats {
            Stats::load(Path::new(&self.settings.cache_dir))
        }

        fn entry_count(&self) -> usize {
            LocalStore::new(Path::new(&self.settings.cache_dir), u64::MAX)
                .entry_count()
                .unwrap()
        }
    }

    /// Writes a shell script that mimics the GCC surface the shim
    /// drives: `--version`, `--help`, preprocessing (`-E`, echoing the
    /// include via `-H`-style stderr), dependency generation (`-M`), and
    /// compilation. The compiled "object" embeds the process id so a
    /// replayed artifact is distinguishable from a rerun.
    fn write_fake_gcc(path: &Path, header: &Path) {
        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "--version" ]; then echo "fake gcc 1.0"; exit 0; fi
if [ "$1" = "--help" ]; then echo "usage: fake gcc"; exit 0; fi
HDR="{hdr}"
mode=compile
out=""
src=""
defs=""
prev=""
for a in "$@"; do
  if [ "$prev" = "out" ]; then out="$a"; prev=""; continue; fi
  case "$a" in
    -E) mode=preprocess ;;
    -M) mode=deps ;;
    -o|-MF) prev="out" ;;
    -H|-c) ;;
    -D*) defs="$defs $a" ;;
    -*) ;;
    *) src="$a" ;;
  esac
done
case "$mode" in
  preprocess)
    cat "$src" "$HDR" > "$out" || exit 1
    echo "$defs" >> "$out"
    echo ". $HDR" >&2
    ;;
  deps)
    echo "obj: $src $HDR" > "$out"
    ;;
  compile)
    cat "$src" "$HDR" > "$out" || exit 1
    echo "$defs" >> "$out"
    echo "pid $$" >> "$out"
    ;;
esac
exit 0
"#,
            hdr = header.display()
        );
        std::fs::write(path, script).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn repeated_compile_is_served_from_cache() {
        let p = Project::new();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        let first = std::fs::read(&p.obj).unwrap();
        std::fs::remove_file(&p.obj).unwrap();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        let second = std::fs::read(&p.obj).unwrap();

        // A rerun would embed a fresh pid; a replay is byte-identical.
        assert_eq!(first, second);
        let stats = p.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(p.entry_count(), 1);
    }

    #[test]
    fn source_change_invalidates() {
        let p = Project::new();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        std::fs::write(&p.src, "int main(void) { return 1; }\n").unwrap();
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);

        let stats = p.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);

        let obj = std::fs::read_to_string(&p.obj).unwrap();
        assert!(obj.contains("return 1"));
    }

    #[test]
    fn header_change_invalidates() {
        let p = Project::new();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        std::fs::write(&p.hdr, "#define ANSWER 43\n").unwrap();
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);

        let stats = p.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);

        let obj = std::fs::read_to_string(&p.obj).unwrap();
        assert!(obj.contains("ANSWER 43"));
    }

    #[test]
    fn defines_distinguish_entries_via_preprocessed_source() {
        let p = Project::new();

        // -D is elided from the relevant arguments in preprocess mode,
        // but the preprocessed output still reflects it.
        assert_eq!(invoke(&p.settings, &p.compile_command(&["-DFOO=1"])), 0);
        assert_eq!(invoke(&p.settings, &p.compile_command(&["-DFOO=2"])), 0);
        assert_eq!(p.stats().misses, 2);
        assert_eq!(p.stats().hits, 0);

        // Same define again: now it hits.
        assert_eq!(invoke(&p.settings, &p.compile_command(&["-DFOO=1"])), 0);
        assert_eq!(p.stats().hits, 1);
        let obj = std::fs::read_to_string(&p.obj).unwrap();
        assert!(obj.contains("-DFOO=1"));
    }

    #[test]
    fn elided_flags_do_not_affect_the_fingerprint() {
        let p = Project::new();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);

        // A different output path and a diagnostic color flag are both
        // elided from the fingerprint: this still hits.
        let other_obj = p._dir.path().join("elsewhere.o");
        let cmd = vec![
            p.gcc.to_string_lossy().to_string(),
            "-c".to_string(),
            p.src.to_string_lossy().to_string(),
            "-o".to_string(),
            other_obj.to_string_lossy().to_string(),
            "-fdiagnostics-color=always".to_string(),
        ];
        assert_eq!(invoke(&p.settings, &cmd), 0);

        let stats = p.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert!(other_obj.exists());
        assert_eq!(
            std::fs::read(&other_obj).unwrap(),
            std::fs::read(&p.obj).unwrap()
        );
    }

    #[test]
    fn help_runs_transparently() {
        let p = Project::new();
        let cmd = vec![p.gcc.to_string_lossy().to_string(), "--help".to_string()];
        assert_eq!(invoke(&p.settings, &cmd), 0);

        assert_eq!(p.entry_count(), 0);
        let stats = p.stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[test]
    fn response_file_matches_expanded_invocation() {
        let p = Project::new();

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);

        let rsp = p._dir.path().join("resp.txt");
        std::fs::write(
            &rsp,
            format!(
                "-c {} -o {}",
                p.src.to_string_lossy(),
                p.obj.to_string_lossy()
            ),
        )
        .unwrap();
        let cmd = vec![
            p.gcc.to_string_lossy().to_string(),
            format!("@{}", rsp.display()),
        ];
        assert_eq!(invoke(&p.settings, &cmd), 0);

        let stats = p.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn unclaimed_tool_runs_transparently() {
        let p = Project::new();
        // The same script under a name no wrapper claims.
        let other = p._dir.path().join("sometool");
        std::fs::copy(&p.gcc, &other).unwrap();
        std::fs::set_permissions(&other, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut cmd = p.compile_command(&[]);
        cmd[0] = other.to_string_lossy().to_string();
        assert_eq!(invoke(&p.settings, &cmd), 0);

        // The tool still ran and produced its output, uncached.
        assert!(p.obj.exists());
        assert_eq!(p.entry_count(), 0);
    }

    #[test]
    fn disabled_shim_never_touches_the_cache() {
        let mut p = Project::new();
        p.settings.disabled = true;

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        assert_eq!(p.entry_count(), 0);
        assert_eq!(p.stats().hits + p.stats().misses, 0);
    }

    #[test]
    fn missing_tool_reports_not_found() {
        let p = Project::new();
        let cmd = vec!["/nonexistent/bin/gcc".to_string(), "-c".to_string()];
        assert_eq!(invoke(&p.settings, &cmd), 127);
    }

    #[test]
    fn failing_compile_is_not_cached() {
        let p = Project::new();
        // Point the compile at a missing source: the script exits 1.
        let mut cmd = p.compile_command(&[]);
        cmd[2] = p._dir.path().join("missing.c").to_string_lossy().to_string();
        assert_ne!(invoke(&p.settings, &cmd), 0);
        assert_eq!(p.entry_count(), 0);
    }

    #[test]
    fn direct_mode_hits_on_repeat_and_sees_header_changes() {
        let mut p = Project::new();
        p.settings.direct_mode = true;

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        assert_eq!(p.stats().hits, 1);

        std::fs::write(&p.hdr, "#define ANSWER 99\n").unwrap();
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        assert_eq!(p.stats().misses, 2);
    }

    #[test]
    fn hard_links_materialize_hits() {
        use std::os::unix::fs::MetadataExt;

        let mut p = Project::new();
        p.settings.hard_links = true;

        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);
        std::fs::remove_file(&p.obj).unwrap();
        assert_eq!(invoke(&p.settings, &p.compile_command(&[])), 0);

        // The materialized object shares its inode with the store copy.
        assert!(std::fs::metadata(&p.obj).unwrap().nlink() >= 2);
    }
}
