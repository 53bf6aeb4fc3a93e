//! Chunk execution.
//!
//! Exports are global: an `export` in any module adds a symbol to the
//! compiled artefact and is visible by name to every chunk run afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::cheader::{self, HeaderScanner};
use super::chunk::{Chunk, Expr, Stmt, StmtKind};
use super::value::Value;
use super::{Export, ExportValue, HostImport, Runtime, Toolkit};
use crate::backend::{self, BackendError, EmitOptions};
use crate::config::FlagSet;
use crate::module::{ImportContext, ModuleError, ModuleResult, SourceLocation};

/// Separator between entries of a template list (`./?.t;./?/init.t`).
pub const TEMPLATE_SEPARATOR: char = ';';

/// Placeholder a template replaces with the module path.
pub const TEMPLATE_PLACEHOLDER: &str = "?";

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// `?`-templates searched by the built-in loader, in order.
    pub path_templates: Vec<String>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            path_templates: vec!["./?.t".to_string(), "./?/init.t".to_string()],
        }
    }
}

impl RuntimeOptions {
    /// Parse a `;`-separated template list.
    pub fn with_template_list(mut self, list: &str) -> Self {
        self.path_templates = list
            .split(TEMPLATE_SEPARATOR)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        self
    }
}

pub struct Interpreter {
    options: RuntimeOptions,
    exports: Vec<(String, Value)>,
    c_flags: Vec<String>,
    link_flags: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(RuntimeOptions::default())
    }
}

impl Interpreter {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            exports: Vec::new(),
            c_flags: Vec::new(),
            link_flags: Vec::new(),
        }
    }

    pub fn export_value(&self, name: &str) -> Option<&Value> {
        self.exports.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn builtin(&self, name: &str) -> Option<Value> {
        match name {
            "build" => Some(Value::table([
                (
                    "c_flags".to_string(),
                    Value::list(self.c_flags.iter().map(|f| Value::string(f))),
                ),
                (
                    "link_flags".to_string(),
                    Value::list(self.link_flags.iter().map(|f| Value::string(f))),
                ),
            ])),
            "platform" => Some(Value::table([
                ("os".to_string(), Value::string(std::env::consts::OS)),
                ("arch".to_string(), Value::string(std::env::consts::ARCH)),
                ("family".to_string(), Value::string(std::env::consts::FAMILY)),
            ])),
            _ => None,
        }
    }

    /// Candidate files for `name` under the path templates, in order.
    fn template_candidates(&self, name: &str) -> Vec<PathBuf> {
        let module = name.replace('.', std::path::MAIN_SEPARATOR_STR);
        self.options
            .path_templates
            .iter()
            .map(|template| PathBuf::from(template.replace(TEMPLATE_PLACEHOLDER, &module)))
            .collect()
    }

    fn define_export(&mut self, name: &str, value: Value) {
        match self.exports.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.exports.push((name.to_string(), value)),
        }
    }

    fn error(chunk: &Chunk, stmt: &Stmt, message: String) -> ModuleError {
        let file = chunk
            .origin
            .clone()
            .unwrap_or_else(|| PathBuf::from("<string>"));
        ModuleError::runtime_error(
            message,
            Some(SourceLocation {
                file,
                line: stmt.line,
                column: stmt.column,
            }),
        )
    }

    fn eval(
        &mut self,
        expr: &Expr,
        locals: &HashMap<String, Value>,
        chunk: &Chunk,
        stmt: &Stmt,
        imports: &mut ImportContext<Value>,
    ) -> ModuleResult<Value> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Name(name) => locals
                .get(name)
                .or_else(|| self.export_value(name))
                .cloned()
                .ok_or_else(|| Self::error(chunk, stmt, format!("undefined name '{}'", name))),
            Expr::Field(target, field) => {
                let value = self.eval(target, locals, chunk, stmt, imports)?;
                value.field(field).ok_or_else(|| {
                    Self::error(
                        chunk,
                        stmt,
                        format!("cannot index a {} value with '{}'", value.type_name(), field),
                    )
                })
            }
            Expr::Table(fields) => {
                let mut entries = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    entries.push((key.clone(), self.eval(value, locals, chunk, stmt, imports)?));
                }
                Ok(Value::table(entries))
            }
            Expr::Call(function, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, locals, chunk, stmt, imports)?);
                }
                self.call(function, &values, chunk, imports)
                    .map_err(|message| Self::error(chunk, stmt, message))
            }
            Expr::Require(specifier) => imports
                .require(self, specifier, chunk.origin.as_deref())
                .map_err(|e| match &chunk.origin {
                    Some(file) if e.source_location.is_none() => {
                        e.with_source_location(SourceLocation {
                            file: file.clone(),
                            line: stmt.line,
                            column: stmt.column,
                        })
                    }
                    _ => e,
                }),
        }
    }

    fn call(
        &self,
        function: &str,
        args: &[Value],
        chunk: &Chunk,
        imports: &mut ImportContext<Value>,
    ) -> Result<Value, String> {
        match function {
            "assign" => assign(args),
            "includec" | "includecstring" => self.includec(function, args, chunk, imports),
            other => Err(format!("unknown function '{}'", other)),
        }
    }

    /// Import the constants of a C header. The injected `-I` flags come
    /// first, then any flags passed as the second argument; the including
    /// chunk's directory is searched last. Every header read is recorded as
    /// a dependency.
    fn includec(
        &self,
        function: &str,
        args: &[Value],
        chunk: &Chunk,
        imports: &mut ImportContext<Value>,
    ) -> Result<Value, String> {
        let Some(Value::Str(target)) = args.first() else {
            return Err(format!("bad argument #1 to '{}' (string expected)", function));
        };

        let mut flags = self.c_flags.clone();
        match args.get(1) {
            None | Some(Value::Nil) => {}
            Some(Value::Str(flag)) => flags.push(flag.to_string()),
            Some(Value::List(extra)) => flags.extend(extra.iter().map(Value::to_string)),
            Some(other) => {
                return Err(format!(
                    "bad argument #2 to '{}' (list of flags expected, got {})",
                    function,
                    other.type_name()
                ));
            }
        }

        let dirs = cheader::include_dirs(&flags);
        let chunk_dir = chunk.origin.as_deref().and_then(Path::parent);
        let scanner = HeaderScanner::new(&dirs);
        let scan = if function == "includecstring" {
            scanner.scan_source(target, chunk_dir)
        } else {
            cheader::find_header(target, &dirs, chunk_dir).and_then(|path| scanner.scan_file(&path))
        }
        .map_err(|e| e.to_string())?;

        debug!(
            "{} imported {} constants from {} headers",
            function,
            scan.defines.len(),
            scan.files.len()
        );
        for file in &scan.files {
            imports.record_dependency(file.clone());
        }
        Ok(scan.into_table())
    }
}

/// Merge tables left to right into a new table; later keys win.
fn assign(args: &[Value]) -> Result<Value, String> {
    if args.is_empty() {
        return Err("bad argument #1 to 'assign' (table expected, got no value)".to_string());
    }

    let mut merged = BTreeMap::new();
    for (i, arg) in args.iter().enumerate() {
        match arg {
            Value::Table(entries) => {
                merged.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            other => {
                return Err(format!(
                    "bad argument #{} to 'assign' (table expected, got {})",
                    i + 1,
                    other.type_name()
                ));
            }
        }
    }
    Ok(Value::table(merged))
}

impl Runtime for Interpreter {
    type Chunk = Chunk;
    type Value = Value;

    fn load_chunk(&mut self, path: &Path) -> ModuleResult<Chunk> {
        let source = fs::read_to_string(path)
            .map_err(|e| ModuleError::io_error(path.to_path_buf(), e.to_string()))?;
        Chunk::from_file(path, &source).map_err(|e| {
            ModuleError::parse_error(e.message, path.to_path_buf(), e.line, e.column)
        })
    }

    fn execute(&mut self, chunk: &Chunk, imports: &mut ImportContext<Value>) -> ModuleResult<Value> {
        debug!("executing {} (sha256 {})", chunk.name(), chunk.content_hash);
        let mut locals: HashMap<String, Value> = HashMap::new();

        for stmt in &chunk.stmts {
            match &stmt.kind {
                StmtKind::Local { name, value } => {
                    let value = self.eval(value, &locals, chunk, stmt, imports)?;
                    locals.insert(name.clone(), value);
                }
                StmtKind::Export { name, value } => {
                    let value = self.eval(value, &locals, chunk, stmt, imports)?;
                    if !matches!(value, Value::Int(_) | Value::Str(_)) {
                        return Err(Self::error(
                            chunk,
                            stmt,
                            format!(
                                "cannot export '{}': a {} value has no native representation",
                                name,
                                value.type_name()
                            ),
                        ));
                    }
                    trace!("export {} = {}", name, value);
                    self.define_export(name, value);
                }
                StmtKind::Link(expr) => match self.eval(expr, &locals, chunk, stmt, imports)? {
                    Value::Str(flag) => self.link_flags.push(flag.to_string()),
                    Value::List(flags) => {
                        for flag in flags.iter() {
                            self.link_flags.push(flag.to_string());
                        }
                    }
                    other => {
                        return Err(Self::error(
                            chunk,
                            stmt,
                            format!("link expects a string, got {}", other.type_name()),
                        ));
                    }
                },
                StmtKind::Expr(expr) => {
                    self.eval(expr, &locals, chunk, stmt, imports)?;
                }
                StmtKind::Return(expr) => return self.eval(expr, &locals, chunk, stmt, imports),
            }
        }

        Ok(Value::Bool(true))
    }

    fn default_import(
        &mut self,
        specifier: &str,
        imports: &mut ImportContext<Value>,
    ) -> ModuleResult<HostImport<Value>> {
        if let Some(value) = self.builtin(specifier) {
            return Ok(HostImport::Loaded(value));
        }

        if let Some(path) = self.search_path(specifier) {
            let chunk = self.load_chunk(&path)?;
            return self.execute(&chunk, imports).map(HostImport::Loaded);
        }

        let mut message = format!("no built-in module '{}'", specifier);
        for candidate in self.template_candidates(specifier) {
            message.push_str(&format!("\nno file '{}'", candidate.display()));
        }
        Ok(HostImport::NotFound(message))
    }

    fn search_path(&self, name: &str) -> Option<PathBuf> {
        self.template_candidates(name)
            .into_iter()
            .find(|candidate| candidate.is_file())
    }
}

impl Toolkit for Interpreter {
    fn inject_flags(&mut self, flags: &FlagSet) {
        self.c_flags.extend(flags.c_flags.iter().cloned());
        self.link_flags.extend(flags.link_flags.iter().cloned());
    }

    fn exports(&self) -> Vec<Export> {
        self.exports
            .iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    Value::Int(n) => ExportValue::Integer(*n),
                    Value::Str(s) => ExportValue::Bytes(s.as_bytes().to_vec()),
                    _ => return None,
                };
                Some(Export {
                    name: name.clone(),
                    value,
                })
            })
            .collect()
    }

    fn link_flags(&self) -> Vec<String> {
        self.link_flags.clone()
    }

    fn save_obj(
        &mut self,
        output: &Path,
        exports: &[Export],
        link_flags: &[String],
        options: &EmitOptions,
    ) -> Result<(), BackendError> {
        backend::save_obj(output, exports, link_flags, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleErrorKind, ModuleResolver};

    fn run_string(interp: &mut Interpreter, source: &str) -> ModuleResult<Value> {
        let chunk = Chunk::from_string(source).unwrap();
        let mut imports = ImportContext::new(ModuleResolver::default());
        interp.execute(&chunk, &mut imports)
    }

    #[test]
    fn test_exports_and_return_value() {
        let mut interp = Interpreter::default();
        let value = run_string(
            &mut interp,
            "local t = { a = 1, b = 'x' }\nexport answer = t.a\nexport name = t.b\nreturn t.b",
        )
        .unwrap();

        assert_eq!(value.to_string(), "x");
        assert_eq!(
            interp.exports(),
            vec![
                Export {
                    name: "answer".into(),
                    value: ExportValue::Integer(1)
                },
                Export {
                    name: "name".into(),
                    value: ExportValue::Bytes(b"x".to_vec())
                },
            ]
        );
    }

    #[test]
    fn test_redefined_export_keeps_position() {
        let mut interp = Interpreter::default();
        run_string(&mut interp, "export a = 1\nexport b = 2\nexport a = 3").unwrap();
        let names: Vec<String> = interp.exports().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(interp.export_value("a"), Some(Value::Int(3))));
    }

    #[test]
    fn test_builtin_modules_and_flags() {
        let mut interp = Interpreter::default();
        interp.inject_flags(&FlagSet {
            c_flags: vec!["-I".into(), "/inc".into()],
            link_flags: vec!["-lm".into()],
        });

        let value = run_string(&mut interp, "local b = require 'build'\nlink '-lz'\nreturn b.link_flags").unwrap();
        assert_eq!(value.to_string(), "[-lm]");
        assert_eq!(interp.link_flags(), vec!["-lm".to_string(), "-lz".to_string()]);

        let os = run_string(&mut interp, "return require('platform').os").unwrap();
        assert_eq!(os.to_string(), std::env::consts::OS);
    }

    #[test]
    fn test_assign_merges_into_new_table() {
        let mut interp = Interpreter::default();
        let value = run_string(
            &mut interp,
            "local base = { a = 1, b = 2 }\nlocal merged = assign(base, { b = 3 }, { c = 'x' })\nreturn { base = base, merged = merged }",
        )
        .unwrap();

        assert_eq!(value.field("merged").unwrap().to_string(), "{a = 1, b = 3, c = x}");
        assert_eq!(value.field("base").unwrap().to_string(), "{a = 1, b = 2}");

        let err = run_string(&mut interp, "return assign({ a = 1 }, 2)").unwrap_err();
        assert!(err.to_string().contains("bad argument #2 to 'assign' (table expected, got integer)"));
    }

    #[test]
    fn test_includec_uses_injected_and_passed_flags() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("inc")).unwrap();
        fs::create_dir_all(root.join("extra")).unwrap();
        fs::write(root.join("inc/limits.h"), "#define MAX 0x10\n#define NAME \"lim\"\n").unwrap();
        fs::write(root.join("extra/more.h"), "#define MORE 7\n").unwrap();

        let mut interp = Interpreter::default();
        interp.inject_flags(&FlagSet {
            c_flags: vec!["-I".into(), root.join("inc").display().to_string()],
            link_flags: Vec::new(),
        });

        let source = format!(
            "local l = includec 'limits.h'\n\
             local m = includec('more.h', '-I{}')\n\
             local s = includecstring('#include <limits.h>\\n#define LOCAL 3')\n\
             export max = l.MAX\nexport name = l.NAME\nexport more = m.MORE\nreturn s",
            root.join("extra").display()
        );
        let chunk = Chunk::from_string(&source).unwrap();
        let mut imports = ImportContext::new(ModuleResolver::default());
        let inline = interp.execute(&chunk, &mut imports).unwrap();

        assert!(matches!(interp.export_value("max"), Some(Value::Int(16))));
        assert_eq!(interp.export_value("name").unwrap().to_string(), "lim");
        assert!(matches!(interp.export_value("more"), Some(Value::Int(7))));
        assert!(matches!(inline.field("LOCAL"), Some(Value::Int(3))));
        assert!(matches!(inline.field("MAX"), Some(Value::Int(16))));
        assert_eq!(
            imports.into_dependencies(),
            vec![
                root.join("inc/limits.h"),
                root.join("extra/more.h"),
                root.join("inc/limits.h"),
            ]
        );
    }

    #[test]
    fn test_includec_missing_header_is_a_runtime_error() {
        let mut interp = Interpreter::default();
        let err = run_string(&mut interp, "local c = includec 'absent.h'").unwrap_err();
        match (&err.kind, &err.source_location) {
            (ModuleErrorKind::RuntimeError { message }, Some(loc)) => {
                assert!(message.contains("header 'absent.h' not found"));
                assert_eq!(loc.line, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_runtime_errors_carry_location() {
        let mut interp = Interpreter::default();
        let err = run_string(&mut interp, "local a = 1\nexport t = { x = a }").unwrap_err();
        match (&err.kind, &err.source_location) {
            (ModuleErrorKind::RuntimeError { message }, Some(loc)) => {
                assert!(message.contains("cannot export 't'"));
                assert_eq!(loc.line, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = run_string(&mut interp, "return missing").unwrap_err();
        assert!(err.to_string().contains("undefined name 'missing'"));
    }

    #[test]
    fn test_not_found_message_lists_templates() {
        let mut interp =
            Interpreter::new(RuntimeOptions::default().with_template_list("/nowhere/?.t;/nowhere/?/init.t"));
        let mut imports = ImportContext::new(ModuleResolver::default());
        match interp.default_import("a.b", &mut imports).unwrap() {
            HostImport::NotFound(message) => {
                assert!(message.contains("no built-in module 'a.b'"));
                assert!(message.contains(&format!(
                    "no file '/nowhere/a{}b.t'",
                    std::path::MAIN_SEPARATOR
                )));
            }
            HostImport::Loaded(v) => panic!("unexpected module {}", v),
        }
    }
}
