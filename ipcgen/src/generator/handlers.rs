use std::path::Path;

use super::{
    file, functions, is_identifier, request_type, takes_args, GenerationContext, GlobalErrorHandler,
    ImportSet,
};
use crate::model::{FunctionEntry, PackageInfo, ParamBinding};

const RESULT_TYPES: &str = "export type Success<T> = { ok: true; data: T };
export type Failure<E> = { ok: false; error: E };
export type Result<T, E> = Success<T> | Failure<E>;
";

/// Host-side handlers: validation, the call itself and error routing.
///
/// A thrown error goes to the function's own error handler first. A
/// `null`/`undefined` answer falls through to the global handler, and
/// without one to the raw error. A handler that throws itself yields the
/// raw error.
pub fn generate_handlers(
    packages: &[PackageInfo],
    out_dir: &Path,
    context: &GenerationContext,
) -> String {
    let mut imports = ImportSet::new(out_dir);
    let mut handlers = String::new();

    for (path, entry) in functions(packages) {
        if handlers.is_empty() {
            imports.file_type(&context.context.path, &context.context.name);
            if let Some(global) = &context.global_error_handler {
                imports.file_value(&global.path, &global.function_name);
            }
        }
        imports.type_imports(entry.type_imports());
        imports.file_value(path, &entry.name);
        if let Some(validator) = &entry.validator_name {
            imports.file_value(path, validator);
        }
        if let Some(handler) = &entry.error_handler_name {
            imports.file_value(path, handler);
        }
        handlers.push_str(&handler(entry, &context.context.name));
    }

    let mut body = String::from(RESULT_TYPES);
    if handlers.is_empty() {
        body.push_str("\nexport const handlers = {};\n");
    } else {
        body.push_str("\nconst success = <T>(data: T): Success<T> => ({ ok: true, data });\n");
        body.push_str("const failure = <E>(error: E): Failure<E> => ({ ok: false, error });\n");
        body.push_str(&to_failure(context.global_error_handler.as_ref()));
        body.push_str("\nexport const handlers = {\n");
        body.push_str(&handlers);
        body.push_str("};\n");
    }

    file(&imports, &body)
}

fn to_failure(global: Option<&GlobalErrorHandler>) -> String {
    let mut out = String::new();
    out.push_str("\nasync function toFailure(\n");
    out.push_str("  error: unknown,\n");
    out.push_str("  handler?: (error: any) => unknown,\n");
    out.push_str("): Promise<Failure<unknown>> {\n");
    out.push_str("  if (handler) {\n");
    out.push_str("    try {\n");
    out.push_str("      const handled = await handler(error);\n");
    out.push_str("      if (handled !== null && handled !== undefined) {\n");
    out.push_str("        return failure(handled);\n");
    out.push_str("      }\n");
    out.push_str("    } catch {\n");
    out.push_str("      return failure(error);\n");
    out.push_str("    }\n");
    out.push_str("  }\n");
    if let Some(global) = global {
        if global.debug {
            out.push_str("  console.error(error);\n");
        }
        out.push_str("  try {\n");
        out.push_str(&format!(
            "    return failure(await {}(error));\n",
            global.function_name
        ));
        out.push_str("  } catch {\n");
        out.push_str("    return failure(error);\n");
        out.push_str("  }\n");
    } else {
        out.push_str("  return failure(error);\n");
    }
    out.push_str("}\n");
    out
}

fn handler(entry: &FunctionEntry, context_name: &str) -> String {
    let name = &entry.name;
    let params = if takes_args(entry) {
        format!("ctx: {context_name}, args: {}", request_type(&entry.request))
    } else {
        format!("ctx: {context_name}")
    };

    let mut out = format!("  {name}: async ({params}) => {{\n    try {{\n");
    let bag = match &entry.validator_name {
        Some(validator) if entry.bindings.is_empty() => {
            out.push_str(&format!("      await {validator}(args);\n"));
            "args"
        }
        Some(validator) => {
            out.push_str(&format!(
                "      const input = (await {validator}(args)) as typeof args;\n"
            ));
            "input"
        }
        None => "args",
    };

    let mut arguments = vec!["ctx".to_string()];
    arguments.extend(entry.bindings.iter().map(|binding| argument(binding, bag)));
    out.push_str(&format!(
        "      return success(await {name}({}));\n",
        arguments.join(", ")
    ));

    out.push_str("    } catch (error) {\n");
    match &entry.error_handler_name {
        Some(handler) => out.push_str(&format!("      return toFailure(error, {handler});\n")),
        None => out.push_str("      return toFailure(error);\n"),
    }
    out.push_str("    }\n  },\n");
    out
}

fn argument(binding: &ParamBinding, bag: &str) -> String {
    match binding {
        ParamBinding::Bag => bag.to_string(),
        ParamBinding::Field(name) => member(bag, name),
        ParamBinding::Spread(name) => format!("...({} ?? [])", member(bag, name)),
    }
}

fn member(bag: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{bag}.{name}")
    } else {
        format!("{bag}['{}']", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// `registerHandlers` / `unregisterHandlers` over `ipcMain`.
pub fn generate_registration(
    packages: &[PackageInfo],
    out_dir: &Path,
    context: &GenerationContext,
) -> String {
    let mut imports = ImportSet::new(out_dir);
    let entries: Vec<&FunctionEntry> = functions(packages).map(|(_, entry)| entry).collect();

    if !entries.is_empty() {
        imports.module_value("electron", "ipcMain");
    }
    imports.module_type("electron", "IpcMainInvokeEvent");
    imports.file_type(&context.context.path, &context.context.name);
    if !entries.is_empty() {
        imports.file_value(&out_dir.join(super::Artifact::Handlers.file_name()), "handlers");
    }

    let context_name = &context.context.name;
    let mut body = String::new();
    if entries.is_empty() {
        body.push_str(&format!(
            "export function registerHandlers(_createContext: (event: IpcMainInvokeEvent) => {context_name}): void {{}}\n"
        ));
        body.push_str("\nexport function unregisterHandlers(): void {}\n");
        return file(&imports, &body);
    }

    body.push_str(&format!(
        "export function registerHandlers(createContext: (event: IpcMainInvokeEvent) => {context_name}): void {{\n"
    ));
    for entry in &entries {
        let name = &entry.name;
        if takes_args(entry) {
            body.push_str(&format!(
                "  ipcMain.handle('{name}', (event, args) => handlers.{name}(createContext(event), args));\n"
            ));
        } else {
            body.push_str(&format!(
                "  ipcMain.handle('{name}', (event) => handlers.{name}(createContext(event)));\n"
            ));
        }
    }
    body.push_str("}\n");

    body.push_str("\nexport function unregisterHandlers(): void {\n");
    for entry in &entries {
        body.push_str(&format!("  ipcMain.removeHandler('{}');\n", entry.name));
    }
    body.push_str("}\n");

    file(&imports, &body)
}
