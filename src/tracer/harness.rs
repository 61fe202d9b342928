//! Instrumentation harness run inside the target's interpreter.
//!
//! Invoked as `<interpreter> -c SOURCE <report> <script> <max_value_len> <max_steps>`
//! with the target text on stdin. Writes one JSON report (see
//! [`super::report::ExecutionReport`]) to `<report>` and nothing else.
//!
//! Rules the harness enforces:
//! - only frames whose code belongs to `<script>` are traced
//! - dunder names are harness-owned and never recorded
//! - a value whose rendering fails is recorded as [`UNPRINTABLE`]
//! - every string written is valid UTF-8 (lone surrogates are backslash-escaped)
//! - the trace hook is cleared in a `finally` on every path

/// Placeholder recorded for values that cannot be rendered.
pub const UNPRINTABLE: &str = "<unprintable>";

pub(crate) const SOURCE: &str = r#"
import builtins
import json
import os
import sys
import traceback

PLACEHOLDER = "<unprintable>"


def clean(text):
    # Lone surrogates would be dumped as escapes no strict JSON reader accepts.
    return text.encode("utf-8", "backslashreplace").decode("utf-8")


def render(value, limit):
    try:
        text = str(value)
        if not isinstance(text, str):
            return PLACEHOLDER
        if limit > 0 and len(text) > limit:
            text = text[:limit] + "..."
        return clean(text)
    except BaseException:
        return PLACEHOLDER


def format_fault(exc):
    tb = exc.__traceback__
    if tb is not None:
        tb = tb.tb_next
    return clean("".join(traceback.format_exception(type(exc), exc, tb)))


def main():
    report_path = sys.argv[1]
    script_path = os.path.abspath(sys.argv[2])
    limit = int(sys.argv[3])
    max_steps = int(sys.argv[4])
    history = []
    truncated = [False]

    def write(status, error_log):
        with open(report_path, "w", encoding="utf-8") as out:
            json.dump(
                {
                    "status": status,
                    "trace_history": history,
                    "error_log": error_log,
                    "truncated": truncated[0],
                },
                out,
            )

    source = sys.stdin.buffer.read().decode("utf-8")
    try:
        code = compile(source, script_path, "exec")
    except (SyntaxError, ValueError) as exc:
        detail = "".join(traceback.format_exception_only(type(exc), exc)).rstrip()
        write("syntax_error", clean("Syntax Error: %s\n%s" % (exc, detail)))
        return

    def record(frame):
        if max_steps > 0 and len(history) >= max_steps:
            truncated[0] = True
            return
        bindings = {}
        for name, value in list(frame.f_locals.items()):
            if name.startswith("__"):
                continue
            bindings[name] = render(value, limit)
        history.append({"line": frame.f_lineno, "variables": bindings})

    def local_trace(frame, event, arg):
        if event == "line":
            record(frame)
        return local_trace

    def global_trace(frame, event, arg):
        if frame.f_code.co_filename != script_path:
            return None
        return local_trace

    namespace = {"__name__": "__main__", "__file__": script_path, "__builtins__": builtins}
    sys.argv = [script_path]
    sys.path.insert(0, os.path.dirname(script_path))

    status, error_log = "success", None
    sys.settrace(global_trace)
    try:
        exec(code, namespace, namespace)
    except SystemExit as exc:
        sys.settrace(None)
        if exc.code not in (None, 0):
            status, error_log = "runtime_error", format_fault(exc)
    except BaseException as exc:
        sys.settrace(None)
        status, error_log = "runtime_error", format_fault(exc)
    finally:
        sys.settrace(None)
        try:
            sys.stdout.flush()
        except BaseException:
            pass
    write(status, error_log)


main()
"#;
