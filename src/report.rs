use serde_json::json;
use serde_sarif::sarif::{
    Invocation, Location, LogicalLocation, Message, MultiformatMessageString,
    ReportingDescriptor, Result as SarifResult, Run, SCHEMA_URL, Sarif, Tool, ToolComponent,
};

use crate::transform::{Diagnostic, TransformerMetadata};

pub(crate) fn method_location(class_name: &str, method_name: &str, descriptor: &str) -> Location {
    let logical = LogicalLocation::builder()
        .name(format!("{class_name}.{method_name}{descriptor}"))
        .kind("function")
        .build();
    Location::builder().logical_locations(vec![logical]).build()
}

pub(crate) fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

pub(crate) fn diagnostic_result(diagnostic: &Diagnostic) -> SarifResult {
    let location = method_location(
        &diagnostic.class_name,
        &diagnostic.method_name,
        &diagnostic.descriptor,
    );
    SarifResult::builder()
        .rule_id(diagnostic.rule_id)
        .message(result_message(diagnostic.message.clone()))
        .locations(vec![location])
        .build()
}

pub(crate) fn build_invocation(successful: bool) -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");

    Invocation::builder()
        .execution_successful(successful)
        .arguments(arguments)
        .command_line(command_line)
        .build()
}

pub(crate) fn build_sarif(
    rules: &[TransformerMetadata],
    diagnostics: &[Diagnostic],
    invocation: Invocation,
) -> Sarif {
    let rules: Vec<ReportingDescriptor> = rules
        .iter()
        .map(|rule| {
            ReportingDescriptor::builder()
                .id(rule.id)
                .name(rule.name)
                .short_description(
                    MultiformatMessageString::builder()
                        .text(rule.description)
                        .build(),
                )
                .build()
        })
        .collect();
    let driver = ToolComponent::builder()
        .name(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .rules(rules)
        .build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let results: Vec<SarifResult> = diagnostics.iter().map(diagnostic_result).collect();
    let run = Run::builder()
        .tool(tool)
        .invocations(vec![invocation])
        .results(results)
        .build();

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}
