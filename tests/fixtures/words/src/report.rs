fn report(lines: &[String]) {
    render_summary(lines.len());
}
