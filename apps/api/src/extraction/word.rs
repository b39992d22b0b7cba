use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent,
    TableChild, TableRowChild,
};

use super::{DocumentKind, ExtractionError};

/// Raw text of a DOCX body: one line per paragraph, table cells included in
/// reading order. No layout or formatting is reconstructed.
pub(super) fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = read_docx(bytes)
        .map_err(|e| ExtractionError::failed(DocumentKind::Word, e.to_string()))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => table_lines(t, &mut lines),
            _ => {}
        }
    }

    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children(&paragraph.children, &mut text);
    text
}

fn push_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            // Email addresses and profile links usually live inside hyperlinks.
            ParagraphChild::Hyperlink(link) => push_children(&link.children, out),
            _ => {}
        }
    }
}

fn table_lines(table: &Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(p) => lines.push(paragraph_text(p)),
                    TableCellContent::Table(nested) => table_lines(nested, lines),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

    use super::super::fixtures::docx_with_paragraphs;
    use super::*;

    #[test]
    fn test_runs_concatenate_within_paragraph() {
        let mut cursor = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Rust, "))
                    .add_run(Run::new().add_text("SQL")),
            )
            .build()
            .pack(&mut cursor)
            .unwrap();

        assert_eq!(extract_docx_text(&cursor.into_inner()).unwrap(), "Rust, SQL");
    }

    #[test]
    fn test_table_cells_are_extracted() {
        let mut cursor = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Skills")))
            .add_table(Table::new(vec![TableRow::new(vec![
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Rust"))),
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Go"))),
            ])]))
            .build()
            .pack(&mut cursor)
            .unwrap();

        assert_eq!(
            extract_docx_text(&cursor.into_inner()).unwrap(),
            "Skills\nRust\nGo"
        );
    }

    #[test]
    fn test_paragraph_order_preserved() {
        let bytes = docx_with_paragraphs(&["Experience", "Education", "Skills"]);
        assert_eq!(
            extract_docx_text(&bytes).unwrap(),
            "Experience\nEducation\nSkills"
        );
    }

    #[test]
    fn test_not_a_zip_fails() {
        assert!(extract_docx_text(b"plain bytes").is_err());
    }
}
