use std::path::Path;

use super::{
    block, file, functions, request_type, GenerationContext, GlobalErrorHandler, ImportSet,
    PascalNames,
};
use crate::model::{FunctionEntry, PackageInfo};

/// Renderer service: ambient `window.api` typing, the `ApiService`
/// interface and a class delegating to the bridge.
pub fn generate_service(
    packages: &[PackageInfo],
    out_dir: &Path,
    context: &GenerationContext,
) -> String {
    let global = context.global_error_handler.as_ref();
    let mut imports = ImportSet::new(out_dir);
    let mut aliases = String::new();
    let mut api = String::new();
    let mut interface = String::new();
    let mut class = String::new();
    let mut taken = PascalNames::default();

    for (path, entry) in functions(packages) {
        if aliases.is_empty() {
            if let Some(global) = global {
                imports.file_type(&global.path, &global.function_name);
            }
        }
        imports.file_type(path, &entry.name);
        if let Some(handler) = &entry.error_handler_name {
            imports.file_type(path, handler);
        }
        imports.type_imports(entry.type_imports());

        let names = Names::new(entry, &mut taken);
        aliases.push_str(&type_aliases(entry, &names, global));

        let wrapped = format!("Promise<Result<{}, {}>>", names.data, names.error);
        let params = names.params();
        api.push_str(&format!("  {}({params}): {wrapped};\n", entry.name));

        let returns = if context.unwrap_results {
            format!("Promise<{}>", names.data)
        } else {
            wrapped
        };
        interface.push_str(&format!("  {}({params}): {returns};\n", entry.name));
        class.push_str(&method(entry, &names, &returns, context.unwrap_results));
    }

    let mut body = String::new();
    body.push_str("export type Result<T, E> = { ok: true; data: T } | { ok: false; error: E };\n");
    body.push_str(&aliases);
    body.push_str(&block("export interface IpcApi", &api));
    body.push_str("\ndeclare global {\n  interface Window {\n    api: IpcApi;\n  }\n}\n");
    body.push_str(&block("export interface ApiService", &interface));
    body.push_str(&block("export class ApiServiceImpl implements ApiService", &class));
    body.push_str("\nexport const apiService: ApiService = new ApiServiceImpl();\n");

    file(&imports, &body)
}

/// Generated type names of one function.
struct Names {
    args: Option<String>,
    data: String,
    error: String,
}

impl Names {
    fn new(entry: &FunctionEntry, taken: &mut PascalNames) -> Self {
        let base = taken.claim(&entry.name);
        Self {
            args: (!entry.request.is_empty()).then(|| format!("{base}Args")),
            data: format!("{base}Data"),
            error: format!("{base}Error"),
        }
    }

    fn params(&self) -> String {
        self.args
            .as_ref()
            .map(|args| format!("args: {args}"))
            .unwrap_or_default()
    }
}

fn type_aliases(entry: &FunctionEntry, names: &Names, global: Option<&GlobalErrorHandler>) -> String {
    let mut out = String::from("\n");
    if let Some(args) = &names.args {
        out.push_str(&format!(
            "export type {args} = {};\n",
            request_type(&entry.request)
        ));
    }
    out.push_str(&format!(
        "export type {} = Awaited<ReturnType<typeof {}>>;\n",
        names.data, entry.name
    ));
    out.push_str(&format!(
        "export type {} = {};\n",
        names.error,
        error_type(entry, global)
    ));
    out
}

/// Union of the per-function and global handler results, `unknown` when
/// neither exists.
fn error_type(entry: &FunctionEntry, global: Option<&GlobalErrorHandler>) -> String {
    let mut parts = Vec::new();
    if let Some(handler) = &entry.error_handler_name {
        parts.push(format!("NonNullable<Awaited<ReturnType<typeof {handler}>>>"));
    }
    if let Some(global) = global {
        parts.push(format!(
            "Awaited<ReturnType<typeof {}>>",
            global.function_name
        ));
    }
    if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join(" | ")
    }
}

fn method(entry: &FunctionEntry, names: &Names, returns: &str, unwrap: bool) -> String {
    let name = &entry.name;
    let params = names.params();
    let call_args = if names.args.is_some() { "args" } else { "" };

    if unwrap {
        format!(
            "  async {name}({params}): {returns} {{\n    \
             const result = await window.api.{name}({call_args});\n    \
             if (!result.ok) {{\n      \
             throw result.error;\n    \
             }}\n    \
             return result.data;\n  \
             }}\n"
        )
    } else {
        format!(
            "  {name}({params}): {returns} {{\n    \
             return window.api.{name}({call_args});\n  \
             }}\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fixtures;
    use std::path::PathBuf;

    fn renderer_dir() -> &'static Path {
        Path::new("/app/src/renderer/ipc")
    }

    #[test]
    fn test_service_type_aliases() {
        let output = generate_service(&fixtures::packages(), renderer_dir(), &fixtures::context());

        assert!(output.contains(
            "import type { createUser, createUserErrorHandler, getUser } from '../../main/api/users';\n"
        ));
        assert!(output.contains("import type { Role } from '../../main/types';\n"));
        assert!(output.contains(
            "export type CreateUserArgs = { name: string; email?: string | undefined; role: Role };\n\
             export type CreateUserData = Awaited<ReturnType<typeof createUser>>;\n\
             export type CreateUserError = NonNullable<Awaited<ReturnType<typeof createUserErrorHandler>>>;\n"
        ));
        assert!(output.contains("export type GetUserError = unknown;\n"));
        assert!(!output.contains("PingArgs"));
    }

    #[test]
    fn test_wrapped_mode_returns_results() {
        let output = generate_service(&fixtures::packages(), renderer_dir(), &fixtures::context());

        assert!(output.contains(
            "export interface IpcApi {\n  \
             createUser(args: CreateUserArgs): Promise<Result<CreateUserData, CreateUserError>>;\n  \
             getUser(args: GetUserArgs): Promise<Result<GetUserData, GetUserError>>;\n  \
             ping(): Promise<Result<PingData, PingError>>;\n\
             }\n"
        ));
        assert!(output.contains("declare global {\n  interface Window {\n    api: IpcApi;\n  }\n}\n"));
        assert!(output.contains(
            "  getUser(args: GetUserArgs): Promise<Result<GetUserData, GetUserError>> {\n    \
             return window.api.getUser(args);\n  \
             }\n"
        ));
        assert!(output.contains("    return window.api.ping();\n"));
        assert!(!output.contains("throw"));
    }

    #[test]
    fn test_unwrapped_mode_throws_failures() {
        let mut context = fixtures::context();
        context.unwrap_results = true;

        let output = generate_service(&fixtures::packages(), renderer_dir(), &context);

        assert!(output.contains("  getUser(args: GetUserArgs): Promise<GetUserData>;\n"));
        assert!(output.contains(
            "  async getUser(args: GetUserArgs): Promise<GetUserData> {\n    \
             const result = await window.api.getUser(args);\n    \
             if (!result.ok) {\n      \
             throw result.error;\n    \
             }\n    \
             return result.data;\n  \
             }\n"
        ));
        // The bridge table keeps the wrapped shape.
        assert!(output.contains("  getUser(args: GetUserArgs): Promise<Result<GetUserData, GetUserError>>;\n"));
    }

    #[test]
    fn test_error_type_combines_handlers() {
        let mut context = fixtures::context();
        context.global_error_handler = Some(GlobalErrorHandler {
            path: PathBuf::from("/app/src/main/errors.ts"),
            function_name: "handleError".to_string(),
            debug: false,
        });

        let output = generate_service(&fixtures::packages(), renderer_dir(), &context);

        assert!(output.contains("import type { handleError } from '../../main/errors';\n"));
        assert!(output.contains(
            "export type CreateUserError = NonNullable<Awaited<ReturnType<typeof createUserErrorHandler>>> | Awaited<ReturnType<typeof handleError>>;\n"
        ));
        assert!(output.contains("export type PingError = Awaited<ReturnType<typeof handleError>>;\n"));
    }

    #[test]
    fn test_colliding_aliases_get_suffixes() {
        let mut packages = fixtures::packages();
        let mut twin = packages[0].func[1].clone();
        assert_eq!(twin.name, "getUser");
        twin.name = "get_user".to_string();
        packages[0].func.push(twin);

        let output = generate_service(&packages, renderer_dir(), &fixtures::context());

        assert!(output.contains("export type GetUserData = Awaited<ReturnType<typeof getUser>>;\n"));
        assert!(output.contains("export type GetUser2Data = Awaited<ReturnType<typeof get_user>>;\n"));
        assert!(output.contains(
            "  get_user(args: GetUser2Args): Promise<Result<GetUser2Data, GetUser2Error>>;\n"
        ));
        assert_eq!(output.matches("export type GetUserArgs =").count(), 1);
    }

    #[test]
    fn test_empty_service_is_valid() {
        let output = generate_service(&[], renderer_dir(), &fixtures::context());

        assert!(output.contains("export interface IpcApi {}\n"));
        assert!(output.contains("export interface ApiService {}\n"));
        assert!(output.contains("export class ApiServiceImpl implements ApiService {}\n"));
        assert!(output.contains("export const apiService: ApiService = new ApiServiceImpl();\n"));
        assert!(!output.contains("import"));
    }
}
