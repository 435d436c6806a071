/// Seed corpus written into an empty knowledge store, as `(content, category)`.
pub const DEFAULT_KNOWLEDGE: &[(&str, &str)] = &[
    (
        "Per pulire il forno naturalmente, usa bicarbonato di sodio e aceto. Crea una pasta con bicarbonato e acqua, applicala nel forno, lascia agire, poi spruzza aceto e pulisci.",
        "pulizia",
    ),
    (
        "Multiuso naturale: mescola parti uguali di aceto bianco e acqua, aggiungi alcune gocce di olio essenziale di limone. Ottimo per superfici e vetri.",
        "pulizia",
    ),
    (
        "Per rimuovere il calcare dai rubinetti, immergi un panno nell'aceto bianco e avvolgilo intorno al rubinetto. Lascia agire 30 minuti, poi strofina e risciacqua.",
        "pulizia",
    ),
    (
        "Controlla le bollette di luce e gas ogni mese per verificare consumi anomali. Conserva sempre le fatture per almeno 5 anni.",
        "utenze",
    ),
    (
        "Per risparmiare energia, usa lampadine LED, spegni sempre le luci quando esci, e regola il termostato a 19-20°C in inverno.",
        "utenze",
    ),
    (
        "Il contratto di fornitura elettrica può essere cambiato gratuitamente. Confronta le offerte almeno una volta all'anno.",
        "utenze",
    ),
    (
        "Per sbloccare scarichi intasati, versa bicarbonato seguito da aceto caldo. Copri lo scarico per 15 minuti, poi sciacqua con acqua bollente.",
        "manutenzione",
    ),
    (
        "Pulisci i filtri del condizionatore ogni 2-3 mesi per mantenere l'efficienza e la qualità dell'aria.",
        "manutenzione",
    ),
    (
        "Per eliminare odori dal frigorifero, posiziona una ciotola di bicarbonato aperta all'interno e cambiala ogni 3 mesi.",
        "casa",
    ),
    (
        "Le piante d'appartamento come pothos e sansevieria purificano l'aria naturalmente e sono facili da curare.",
        "casa",
    ),
];
