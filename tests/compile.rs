use std::fs;
use std::path::Path;

use psp_compiler::{Compiler, CompilerConfig, ErrorKind, IndentStyle};

fn compile(source: &str) -> String {
    Compiler::default()
        .compile_str("page.psp", source)
        .unwrap()
        .source
}

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_expression_written_once() {
    let out = compile("<%= 1+1 %>");
    assert_eq!(out.matches("res.write(_formatter(1+1))").count(), 1);
}

#[test]
fn test_braces_page() {
    let config = CompilerConfig::builder()
        .default_indent_style(IndentStyle::Braces)
        .build();
    let page = Compiler::new(config)
        .compile_str("page.psp", "plain<% if x:{ %>A<% } %>rest")
        .unwrap();
    let expected = "        res.write(\"\"\"plain\"\"\")
        if x:
            res.write(\"\"\"A\"\"\")

        res.write(\"\"\"rest\"\"\")

##footer
";
    assert!(page.source.ends_with(expected), "{}", page.source);
}

#[test]
fn test_braces_from_page_directive() {
    let out = compile(
        "<%@ page indentType=\"braces\" indentSpaces=\"2\" %><% for i in l:{ %><%= i %><% } %>",
    );
    assert!(out.contains("\n    for i in l:\n      res.write(_formatter(i))\n"));
    assert!(out.contains("\n  def canBeThreaded(self):\n"));
}

#[test]
fn test_imported_base_class() {
    let out = compile("<%@ page import=\"a:b\" extends=\"b\" %>x");
    assert!(out.contains("\nfrom a import b\n"));
    assert!(!out.contains("\nimport b\n"));
    assert!(out.contains("_base = b\n"));
}

#[test]
fn test_page_directives() {
    let out = compile(
        "<%@ page method=\"writeContent\" isThreadSafe=\"yes\" isInstanceSafe=\"no\" formatter=\"repr\" %>",
    );
    assert!(out.contains("\tdef writeContent(self, transaction=None):\n"));
    assert!(out.contains("\t\tself._writeContent(res, req, trans)\n"));
    assert!(out.contains("\tdef _writeContent(self, res, req=None, trans=None):\n"));
    assert!(out.contains("\tdef canBeThreaded(self):\n\t\treturn 1\n"));
    assert!(out.contains("\tdef canBeReused(self):\n\t\treturn 0\n"));
    assert!(out.contains("\t\t_formatter = repr\n"));
}

#[test]
fn test_unknown_page_attribute() {
    let err = Compiler::default()
        .compile_str("page.psp", "<%@ page language=\"python\" %>")
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnknownDirective {
            name: "language".to_string()
        }
    );
}

#[test]
fn test_file_class_and_method_blocks() {
    let out = compile(
        "<psp:file>\nimport os\n</psp:file>\n\
         <psp:class>\ncounter = 0\n</psp:class>\n\
         <psp:method name=\"greet\" params=\"who\">\nreturn \"Hello \" + who\n</psp:method>\n\
         <%= self.greet(\"you\") %>",
    );
    let file_code = out.find("# File level user code\n\nimport os\n").unwrap();
    let class_header = out.find("class page_psp(").unwrap();
    let class_code = out.find("\t# Class level user code\n\n\n\tcounter = 0\n").unwrap();
    let method = out
        .find("\tdef greet(self, who):\n\n\t\treturn \"Hello \" + who\n")
        .unwrap();
    let main = out.find("\tdef writeHTML(").unwrap();
    assert!(file_code < class_header);
    assert!(class_header < class_code);
    assert!(class_code < method);
    assert!(method < main);
    assert!(out.contains("\t\tres.write(_formatter(self.greet(\"you\")))\n"));
}

#[test]
fn test_static_insert_is_escaped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "quote.txt", "say \"\"\"hi\"\"\" \\ done");
    write(dir.path(), "page.psp", "<psp:insert file=\"quote.txt\" static=\"true\"/>");

    let page = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap();
    assert!(page
        .source
        .contains("res.write(\"\"\"say \\\"\\\"\\\"hi\\\"\\\"\\\" \\\\ done\"\"\")"));
}

#[test]
fn test_dynamic_insert_reads_at_serve_time() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "news.txt", "today");
    write(dir.path(), "page.psp", "<psp:insert file=\"news.txt\">");

    let page = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap();
    assert!(page.source.contains("self.__includeFile(\""));
    assert!(page.source.contains("news.txt\")"));
    assert!(!page.source.contains("today"));
}

#[test]
fn test_missing_insert() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.psp", "<psp:insert file=\"gone.txt\"/>");
    let err = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ResourceError { .. }));
}

#[test]
fn test_missing_include() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "page.psp", "a<%@ include file=\"nope.psp\" %>b");
    let err = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap_err();
    match err.kind {
        ErrorKind::ResourceError { path, .. } => assert_eq!(path, "nope.psp"),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.location.unwrap().start_line(), 1);
}

#[test]
fn test_include_text_is_inlined() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "header.psp", "<h1><%= title %></h1>");
    write(
        dir.path(),
        "page.psp",
        "<html><%@ include file=\"header.psp\" %></html>",
    );
    let out = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap()
        .source;
    let body = &out[out.find("_formatter = str").unwrap()..];
    assert!(body.contains(
        "res.write(\"\"\"<html><h1>\"\"\")\n\t\tres.write(_formatter(title))\n\t\tres.write(\"\"\"</h1></html>\"\"\")\n"
    ));
}

#[test]
fn test_delimiters_stay_inside_includes() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "open.psp", "<% if a:");
    write(dir.path(), "page.psp", "<%@ include file=\"open.psp\" %> %>after");

    let err = Compiler::default()
        .compile_file(dir.path().join("page.psp"))
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::MalformedConstruct {
            expected: "%>".to_string()
        }
    );

    let compat = Compiler::new(
        CompilerConfig::builder()
            .delimiters_cross_includes(true)
            .build(),
    );
    let out = compat
        .compile_file(dir.path().join("page.psp"))
        .unwrap()
        .source;
    assert!(out.contains("\t\tif a:"));
    assert!(out.contains("\t\t\tres.write(\"\"\"after\"\"\")\n"));
}

#[test]
fn test_runtime_include() {
    let out = compile("<psp:include path=\"/footer.psp\">");
    assert!(out.contains("\t\t__pspincludepath = \"/footer.psp\"\n"));
}

#[test]
fn test_compile_is_deterministic() {
    let source = "<%@ page imports=\"os,sys\" %>\n<% for i in range(2): %>\n  <%= i %>\n<% end %>done";
    assert_eq!(compile(source), compile(source));
}

#[test]
fn test_unterminated_script_reports_start() {
    let err = Compiler::default()
        .compile_str("page.psp", "line one\n  <% x = 1")
        .unwrap_err();
    assert_eq!(err.to_string(), "page.psp:2:5: reached end of input while looking for `%>`");
}

#[test]
fn test_braces_script_error_located() {
    let err = Compiler::default()
        .compile_str(
            "page.psp",
            "line\n<%@ page indentType=\"braces\" %>\n<% x = 'open %>",
        )
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::UnterminatedQuote {
            quote: "'".to_string()
        }
    );
    assert_eq!(err.location.as_ref().unwrap().start_line(), 3);
    assert!(err.to_string().starts_with("page.psp:3:3: "), "{}", err);
}

#[test]
fn test_self_include_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "loop.psp", "before<%@ include file=\"loop.psp\" %>after");

    let err = Compiler::default()
        .compile_file(dir.path().join("loop.psp"))
        .unwrap_err();
    match err.kind {
        ErrorKind::ResourceError { path, message } => {
            assert_eq!(path, "loop.psp");
            assert_eq!(message, "file includes itself");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_zero_indent_spaces_rejected() {
    let err = Compiler::default()
        .compile_str("page.psp", "<%@ page indentSpaces=\"0\" %>x")
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidDirectiveValue { .. }));
}
