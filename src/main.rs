use anyhow::{Context, Result};
use clap::Parser;
use peinfo::{
    DataDirectoryType, ExportTable, ImportTable, ImportThunk, PeFile, PeHeaders, Reader, Request,
    SectionHeader, Subsystem, TableResult,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peinfo", version, about = "Show headers, sections, imports and exports of a PE image")]
struct Cli {
    /// Print the export table
    #[arg(short = 'e', long)]
    exports: bool,

    /// Print the import table
    #[arg(short = 'i', long)]
    imports: bool,

    /// Print the section table ("objects")
    #[arg(short = 'o', long = "objects")]
    objects: bool,

    /// PE file to inspect
    file: PathBuf,
}

impl Cli {
    fn request(&self) -> Request {
        Request {
            sections: self.objects,
            imports: self.imports,
            exports: self.exports,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    println!("opening:{}", cli.file.display());

    let pe = PeFile::from_file(&cli.file)
        .with_context(|| format!("Failed to read PE headers from {}", cli.file.display()))?;
    print_headers(pe.headers());

    let request = cli.request();
    if !request.needs_sections() {
        return Ok(());
    }

    let analysis = pe
        .analyze(&request)
        .with_context(|| format!("Failed to analyze {}", cli.file.display()))?;

    if let Some(exports) = &analysis.exports {
        print_exports(exports);
    }
    if let Some(imports) = &analysis.imports {
        print_imports(imports);
    }
    if let Some(sections) = &analysis.sections {
        print_sections(&pe, sections);
    }

    Ok(())
}

fn print_headers(headers: &PeHeaders) {
    println!("PE header @{:x}", headers.pe_offset);

    let bitness = headers.bitness().map_or("unknown image", |b| b.name());
    let machine = headers
        .image_header
        .machine_type()
        .map_or("unknown", |m| m.name());
    println!("{bitness} ({machine})");

    let Some(optional) = &headers.optional_header else {
        return;
    };
    let base = optional.image_base();
    let entry = u64::from(headers.entry_point());
    println!("ImageBase:\t\t{base:x}");
    println!("ImageSize:\t\t{:x}", optional.size_of_image());
    println!("SectionAlign:\t\t{:x}", optional.section_alignment());
    println!("FileAlign:\t\t{:x}", optional.file_alignment());
    match Subsystem::from_u16(optional.subsystem()) {
        Some(subsystem) => println!("Subsystem:\t\t{subsystem:?}"),
        None => println!("Subsystem:\t\t{:x}", optional.subsystem()),
    }
    let kind = if headers.image_header.is_dll() { " (DLL)" } else { "" };
    println!("Characteristics:\t{:x}{kind}", headers.image_header.characteristics);
    println!("EntryPointRVA:\t\t{entry:x} ({:x})", entry.wrapping_add(base));

    if let Some(dirs) = &headers.data_directories {
        let export = dirs.export();
        let import = dirs.import();
        println!(
            "ExportTableRVA:\t\t{:x} ({:x})",
            export.virtual_address,
            u64::from(export.virtual_address).wrapping_add(base)
        );
        println!("TotalExportDataSize:\t{:x}", export.size);
        println!(
            "ImportTableRVA:\t\t{:x} ({:x})",
            import.virtual_address,
            u64::from(import.virtual_address).wrapping_add(base)
        );
        println!("TotalImportDataSize:\t{:x}", import.size);
    }
}

fn print_exports(exports: &TableResult<ExportTable>) {
    let table = match exports {
        Ok(table) => table,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    let dir = &table.directory;
    println!("\tExport Table:");
    println!("\t\tFlags:{:08x}", dir.flags);
    println!("\t\tMajVer:{:04x}", dir.major_version);
    println!("\t\tMinVer:{:04x}", dir.minor_version);
    println!("\t\tNameRVA:{:08x} ({})", dir.name_rva, table.module_name);
    println!("\t\tOrdinalBase:{:08x}", dir.ordinal_base);
    println!("\t\tNumEATEntries:{:08x}", dir.number_of_functions);
    println!("\t\tNumNamePtrs:{:08x}", dir.number_of_names);
    println!("\t\tAddressTableRVA:{:08x}", dir.address_table_rva);
    println!("\t\tNamePtrTableRVA:{:08x}", dir.name_pointer_table_rva);
    println!("\t\tOrdinalTableRVA:{:08x}", dir.ordinal_table_rva);
    for entry in &table.entries {
        println!("\t\t\t{:08x}: {}", entry.address, entry.name);
    }
}

fn print_imports(imports: &TableResult<ImportTable>) {
    let table = match imports {
        Ok(table) => table,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    println!("\tImport Table:");
    for module in &table.modules {
        let desc = &module.descriptor;
        println!("\t\tImpFlags:{:08x}", desc.flags);
        println!("\t\tNameRVA:{:08x} ({})", desc.name_rva, module.name);
        println!("\t\tImpTabRVA:{:08x}", desc.thunk_rva);
        for symbol in &module.symbols {
            match &symbol.thunk {
                ImportThunk::Name { name, .. } => {
                    println!("\t\t\t{:08x}: {name}", symbol.address)
                }
                ImportThunk::Ordinal(ordinal) => println!("\t\t\t{ordinal:#x}: ???"),
            }
        }
        println!();
    }
}

fn print_sections<R: Reader>(pe: &PeFile<R>, sections: &[SectionHeader]) {
    let headers = pe.headers();
    let base = headers.image_base().unwrap_or_default();
    let table_rva = |kind: DataDirectoryType| headers.directory(kind).map(|d| d.virtual_address);
    let import_rva = table_rva(DataDirectoryType::Import);
    let export_rva = table_rva(DataDirectoryType::Export);

    for section in sections {
        println!("object name: {}", section.name_str());
        println!("\tVirtualSize: {:x}", section.virtual_size);
        println!(
            "\tRVA: {:x} ({:x})",
            section.virtual_address,
            u64::from(section.virtual_address).wrapping_add(base)
        );
        println!("\tPhysicalSize: {:x}", section.size_of_raw_data);
        println!("\tPhysicalOffset: {:x}", section.pointer_to_raw_data);
        if import_rva.is_some_and(|rva| section.contains_rva(rva)) {
            println!("\timport table here");
        }
        if export_rva.is_some_and(|rva| section.contains_rva(rva)) {
            println!("\texport table here");
        }
    }
}
